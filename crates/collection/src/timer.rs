use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::trace;

/// Ação diferida executada quando um timer dispara. Recebe o id com que foi agendada.
pub(crate) type ExpireAction = Arc<dyn Fn(u64) + Send + Sync>;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Instrução de timeout passada às operações de mutação.
///
/// - `Refresh`: reinicia o timer existente (se houver) com a mesma duração.
/// - `Keep`: mantém o timer atual exatamente como está.
/// - `After(d)`: cancela o timer anterior e arma um novo com `d`.
///   `Duration::ZERO` torna a entrada permanente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Refresh,
    Keep,
    After(Duration),
}

impl Timeout {
    /// Converte milissegundos em instrução; valores `<= 0` significam "sem expiração".
    pub fn millis(ms: i64) -> Self {
        match u64::try_from(ms) {
            Ok(ms) => Timeout::After(Duration::from_millis(ms)),
            Err(_) => Timeout::permanent(),
        }
    }

    pub const fn permanent() -> Self {
        Timeout::After(Duration::ZERO)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

/// Tempo de vida reportado para uma entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Permanent,
    Expires(Duration),
}

/// Timer de expiração de uma única entrada.
///
/// Dono exclusivo da task agendada: ao ser descartado, a task é abortada.
pub(crate) struct TimerHandle {
    id: u64,
    timeout: Duration,
    armed_at: Instant,
    action: ExpireAction,
    runtime: Handle,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub(crate) fn next_id() -> u64 {
        NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Agenda `action` para daqui a `timeout`. Duração zero não arma nada.
    pub(crate) fn arm(
        runtime: &Handle,
        id: u64,
        timeout: Duration,
        action: ExpireAction,
    ) -> Option<Self> {
        if timeout.is_zero() {
            return None;
        }

        let armed_at = Instant::now();
        let task = schedule(runtime, id, timeout, action.clone());
        trace!(timer = id, ?timeout, "timer armado");

        Some(Self {
            id,
            timeout,
            armed_at,
            action,
            runtime: runtime.clone(),
            task,
        })
    }

    /// Rearma a mesma ação com a duração original, contando a partir de agora.
    ///
    /// O id muda: uma task antiga que já acordou não casa mais com o timer atual.
    pub(crate) fn refresh(&mut self) {
        self.task.abort();
        let previous = self.id;
        self.id = Self::next_id();
        self.armed_at = Instant::now();
        self.task = schedule(&self.runtime, self.id, self.timeout, self.action.clone());
        trace!(timer = self.id, previous, "timer renovado");
    }

    /// Impede que a ação agendada dispare.
    pub(crate) fn cancel(self) {
        trace!(timer = self.id, "timer cancelado");
        drop(self);
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tempo restante; `None` quando o prazo já venceu.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.timeout
            .checked_sub(self.armed_at.elapsed())
            .filter(|left| !left.is_zero())
    }

    pub(crate) fn is_due(&self) -> bool {
        self.remaining().is_none()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("remaining", &self.remaining())
            .finish()
    }
}

fn schedule(runtime: &Handle, id: u64, timeout: Duration, action: ExpireAction) -> JoinHandle<()> {
    runtime.spawn(async move {
        tokio::time::sleep(timeout).await;
        action(id);
    })
}
