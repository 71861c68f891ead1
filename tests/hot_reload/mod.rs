mod bring_up;
mod pool_flow;
