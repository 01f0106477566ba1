/// How a failure should be presented: a local rule the user broke, a failure of
/// the wallet, network or contract, or a response the client could not make sense of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Remote,
    StateMismatch,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "invalid",
            ErrorKind::Remote => "remote",
            ErrorKind::StateMismatch => "mismatch",
        }
    }
}
