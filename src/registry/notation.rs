/// Translates between the dotted keys consumers see and the store's
/// `/project/segment/segment` hierarchy.
///
/// `foo.bar` <-> `/project/foo/bar`. The mapping is a bijection for keys whose
/// segments contain neither `.` nor `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNotation {
    project: String,
}

impl KeyNotation {
    pub fn new(project: impl Into<String>) -> Self {
        Self { project: project.into() }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `/project/`
    pub fn root(&self) -> String {
        format!("/{}/", self.project)
    }

    /// `foo.bar` -> `/project/foo/bar`
    pub fn to_external_key(
        &self,
        internal: &str,
    ) -> String {
        format!("/{}/{}", self.project, internal.replace('.', "/"))
    }

    /// `foo.bar` (or `foo.bar.`) -> `/project/foo/bar/`
    ///
    /// The trailing delimiter keeps `foo.bar` from also matching `foo.barbaz`.
    pub fn to_external_prefix(
        &self,
        prefix: &str,
    ) -> String {
        let trimmed = prefix.trim_end_matches('.');
        if trimmed.is_empty() {
            return self.root();
        }
        format!("{}/", self.to_external_key(trimmed))
    }

    /// `/project/foo/bar` -> `foo.bar`
    pub fn to_internal(
        &self,
        external: &str,
    ) -> String {
        let root = self.root();
        external.strip_prefix(root.as_str()).unwrap_or(external).replace('/', ".")
    }
}
