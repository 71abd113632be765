/// Value a task resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    Int(u64),
    String(String),
    None,
}
