/// Bounds applied to every evaluation so hostile input fails cleanly instead
/// of exhausting the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest accepted input, in bytes.
    pub max_len: usize,
    /// Deepest accepted nesting of sub-expressions (parentheses, call
    /// arguments, operands of prefix operators and of `^`).
    pub max_depth: usize,
}

impl Limits {
    pub const DEFAULT_MAX_LEN: usize = 4096;
    pub const DEFAULT_MAX_DEPTH: usize = 64;
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_len: Self::DEFAULT_MAX_LEN,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}
