/// Erros da engine de coleções com expiração.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("nenhum runtime tokio ativo para agendar expirações")]
    NoRuntime,
}

/// Erros de parsing/validação de comandos do shell.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("comando desconhecido: {0}")]
    Unknown(String),
    #[error("número errado de argumentos para '{0}'")]
    WrongArity(String),
    #[error("timeout inválido: {0}")]
    InvalidTimeout(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}

/// Erro top-level do StormCache.
#[derive(Debug, thiserror::Error)]
pub enum StormError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type StormResult<T> = Result<T, StormError>;
