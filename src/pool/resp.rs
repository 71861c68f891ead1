//! Minimal RESP2 codec used by cache members.

use futures::future::BoxFuture;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;

use crate::Error;
use crate::PoolError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    /// `None` is the null bulk string
    Bulk(Option<Vec<u8>>),
    /// `None` is the null array
    Array(Option<Vec<RespValue>>),
}

pub(crate) fn protocol_error(reason: impl Into<String>) -> Error {
    PoolError::Request {
        family: "redis",
        reason: reason.into(),
    }
    .into()
}

pub(crate) fn io_error(e: std::io::Error) -> Error {
    protocol_error(format!("io: {e}"))
}

/// Encodes a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

async fn read_line<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await.map_err(io_error)?;
    if n == 0 {
        return Err(protocol_error("connection closed by peer"));
    }
    if !line.ends_with(b"\r\n") {
        return Err(protocol_error("reply line not terminated by CRLF"));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_int(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol_error(format!("invalid integer: {}", String::from_utf8_lossy(raw))))
}

/// Reads one complete reply, nested arrays included.
pub fn read_value<'a, R>(reader: &'a mut R) -> BoxFuture<'a, Result<RespValue>>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(async move {
        let line = read_line(reader).await?;
        let Some((&tag, body)) = line.split_first() else {
            return Err(protocol_error("empty reply line"));
        };

        match tag {
            b'+' => Ok(RespValue::Simple(String::from_utf8_lossy(body).into_owned())),
            b'-' => Ok(RespValue::Error(String::from_utf8_lossy(body).into_owned())),
            b':' => Ok(RespValue::Integer(parse_int(body)?)),
            b'$' => {
                let len = parse_int(body)?;
                if len < 0 {
                    return Ok(RespValue::Bulk(None));
                }
                let mut data = vec![0u8; len as usize + 2];
                reader.read_exact(&mut data).await.map_err(io_error)?;
                if !data.ends_with(b"\r\n") {
                    return Err(protocol_error("bulk string not terminated by CRLF"));
                }
                data.truncate(len as usize);
                Ok(RespValue::Bulk(Some(data)))
            }
            b'*' => {
                let len = parse_int(body)?;
                if len < 0 {
                    return Ok(RespValue::Array(None));
                }
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(read_value(reader).await?);
                }
                Ok(RespValue::Array(Some(items)))
            }
            other => Err(protocol_error(format!("unknown reply type byte {:?}", other as char))),
        }
    })
}
