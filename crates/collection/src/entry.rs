use std::fmt;

use crate::timer::{Timeout, TimerHandle, Ttl};

/// Entrada no store: valor + timer de expiração opcional.
pub(crate) struct Entry<V> {
    pub value: V,
    pub timer: Option<TimerHandle>,
    /// Posição na ordem de inserção.
    pub seq: u64,
}

impl<V> Entry<V> {
    pub fn new(value: V, timer: Option<TimerHandle>, seq: u64) -> Self {
        Self { value, timer, seq }
    }

    /// Vencida mas ainda não removida pela task de expiração.
    pub fn is_expired(&self) -> bool {
        self.timer.as_ref().is_some_and(TimerHandle::is_due)
    }

    pub fn ttl(&self) -> Ttl {
        match &self.timer {
            Some(timer) => Ttl::Expires(timer.remaining().unwrap_or_default()),
            None => Ttl::Permanent,
        }
    }

    pub fn timeout(&self) -> Ttl {
        match &self.timer {
            Some(timer) => Ttl::Expires(timer.timeout()),
            None => Ttl::Permanent,
        }
    }

    /// Timeout a transplantar para uma cópia desta entrada.
    ///
    /// `refresh` usa a duração configurada; caso contrário, o tempo restante.
    /// Retorna `None` quando a entrada já venceu e não deve ser copiada.
    pub fn carried_timeout(&self, refresh: bool) -> Option<Timeout> {
        let Some(timer) = &self.timer else {
            return Some(Timeout::permanent());
        };
        let remaining = timer.remaining()?;
        Some(Timeout::After(if refresh {
            timer.timeout()
        } else {
            remaining
        }))
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("value", &self.value)
            .field("ttl", &self.ttl())
            .finish()
    }
}
