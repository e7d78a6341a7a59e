use stormcache_collection::Timeout;
use stormcache_common::CommandError;

/// Cursor sobre os tokens de uma linha para extrair argumentos sequencialmente.
pub struct Parse {
    parts: Vec<String>,
    pos: usize,
}

impl Parse {
    pub fn new(parts: Vec<String>) -> Result<Parse, CommandError> {
        if parts.is_empty() {
            return Err(CommandError::InvalidArgument("linha vazia".into()));
        }
        Ok(Parse { parts, pos: 0 })
    }

    pub fn next_string(&mut self) -> Result<String, CommandError> {
        if self.pos >= self.parts.len() {
            return Err(CommandError::InvalidArgument(
                "argumentos insuficientes".into(),
            ));
        }
        let token = std::mem::take(&mut self.parts[self.pos]);
        self.pos += 1;
        Ok(token)
    }

    pub fn next_int(&mut self) -> Result<i64, CommandError> {
        let s = self.next_string()?;
        s.parse::<i64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' não é um inteiro")))
    }

    /// Timeout opcional: milissegundos, `KEEP` ou `REFRESH`. Ausente vira `None`.
    pub fn next_timeout(&mut self) -> Result<Option<Timeout>, CommandError> {
        if !self.has_remaining() {
            return Ok(None);
        }
        let s = self.next_string()?;
        match s.to_uppercase().as_str() {
            "KEEP" => Ok(Some(Timeout::Keep)),
            "REFRESH" => Ok(Some(Timeout::Refresh)),
            _ => s
                .parse::<i64>()
                .map(|ms| Some(Timeout::millis(ms)))
                .map_err(|_| CommandError::InvalidTimeout(s)),
        }
    }

    /// Verifica se todos os argumentos foram consumidos.
    pub fn finish(&self) -> Result<(), CommandError> {
        if self.pos < self.parts.len() {
            Err(CommandError::InvalidArgument(
                "argumentos extras não esperados".into(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.parts.len()
    }

    /// Retorna o número de argumentos restantes.
    pub fn remaining(&self) -> usize {
        self.parts.len() - self.pos
    }
}
