use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Duration;
use tracing::debug;

use stormcache_common::StoreError;

use crate::entry::Entry;
use crate::timer::{ExpireAction, Timeout, TimerHandle, Ttl};

/// Mapa ordenado por inserção + entradas.
pub(crate) struct State<K, V> {
    data: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> State<K, V> {
    fn new() -> Self {
        Self {
            data: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn insert_new(&mut self, key: K, value: V, timer: Option<TimerHandle>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.data.insert(key, Entry::new(value, timer, seq));
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.data.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    /// Remove a entrada se ela já venceu. Retorna `true` se removeu.
    fn purge_if_expired<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = self.data.get(key).is_some_and(Entry::is_expired);
        if expired {
            self.remove(key);
        }
        expired
    }

    /// Remove todas as entradas vencidas que a task de expiração ainda não alcançou.
    fn purge_expired(&mut self) -> usize {
        let expired: Vec<K> = self
            .data
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn live<Q>(&mut self, key: &Q) -> Option<&mut Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.purge_if_expired(key);
        self.data.get_mut(key)
    }

    /// Entradas vivas na ordem de inserção. Chamar após `purge_expired`.
    pub(crate) fn ordered(&self) -> impl Iterator<Item = (&K, &Entry<V>)> {
        self.order
            .values()
            .filter_map(|key| self.data.get(key).map(|entry| (key, entry)))
    }

    /// Resolve um índice posicional (negativo conta do fim).
    fn key_at(&self, index: isize) -> Option<K> {
        let len = self.data.len();
        let position = if index < 0 {
            len.checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        self.order.values().nth(position).cloned()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Estado compartilhado entre o handle do mapa e as tasks de expiração.
pub(crate) struct Shared<K, V> {
    pub(crate) state: Mutex<State<K, V>>,
    runtime: Handle,
}

impl<K: Eq + Hash + Clone, V> Shared<K, V> {
    /// Chamado pela task de expiração. Só remove se o timer atual da chave
    /// ainda for o que agendou esta chamada.
    fn expire(&self, key: &K, timer_id: u64) {
        let removed = {
            let mut state = self.state.lock();
            let current = state
                .data
                .get(key)
                .and_then(|entry| entry.timer.as_ref())
                .is_some_and(|timer| timer.id() == timer_id);
            if current { state.remove(key) } else { None }
        };

        if removed.is_some() {
            debug!(timer = timer_id, "chave expirada removida");
        }
    }
}

/// Mapa em memória ordenado por inserção cujas entradas podem expirar sozinhas.
///
/// Cada entrada pode carregar um timer próprio agendado no runtime tokio;
/// quando ele dispara, a entrada é removida sem polling externo. Leituras
/// nunca enxergam entradas vencidas, mesmo antes da remoção física.
///
/// Todas as operações são síncronas. Valores são devolvidos por cópia.
pub struct ExpiringMap<K, V> {
    pub(crate) shared: Arc<Shared<K, V>>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Cria um mapa vazio usando o runtime tokio corrente.
    ///
    /// # Panics
    ///
    /// Se chamado fora de um runtime tokio.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    pub fn try_new() -> Result<Self, StoreError> {
        Handle::try_current()
            .map(Self::with_runtime)
            .map_err(|_| StoreError::NoRuntime)
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                runtime,
            }),
        }
    }

    /// Mapa vazio que agenda no mesmo runtime deste.
    pub(crate) fn empty_like(&self) -> Self {
        Self::with_runtime(self.shared.runtime.clone())
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn arm(&self, key: &K, timeout: Duration) -> Option<TimerHandle> {
        let id = TimerHandle::next_id();
        let owner: Weak<Shared<K, V>> = Arc::downgrade(&self.shared);
        let key = key.clone();
        let action: ExpireAction = Arc::new(move |timer_id| {
            if let Some(shared) = owner.upgrade() {
                shared.expire(&key, timer_id);
            }
        });
        TimerHandle::arm(&self.shared.runtime, id, timeout, action)
    }

    /// Primitiva única de inserção/atualização.
    fn set_item(&self, state: &mut State<K, V>, key: K, value: V, timeout: Timeout) {
        match state.live(&key) {
            Some(entry) => {
                entry.value = value;
                match timeout {
                    Timeout::Refresh => {
                        if let Some(timer) = entry.timer.as_mut() {
                            timer.refresh();
                        }
                    }
                    Timeout::Keep => {}
                    Timeout::After(duration) => {
                        if let Some(previous) = entry.timer.take() {
                            previous.cancel();
                        }
                        entry.timer = self.arm(&key, duration);
                    }
                }
            }
            None => {
                let timer = match timeout {
                    Timeout::After(duration) => self.arm(&key, duration),
                    Timeout::Refresh | Timeout::Keep => None,
                };
                state.insert_new(key, value, timer);
            }
        }
    }

    // --- Mutações ---

    /// Insere ou atualiza `key`. Retorna o valor gravado.
    pub fn set(&self, key: K, value: V, timeout: impl Into<Timeout>) -> V {
        let mut state = self.shared.state.lock();
        self.set_item(&mut state, key, value.clone(), timeout.into());
        value
    }

    /// Insere apenas se `key` não existir. Retorna `None` se já existia.
    pub fn add(&self, key: K, value: V, timeout: impl Into<Timeout>) -> Option<V> {
        let mut state = self.shared.state.lock();
        if state.live(&key).is_some() {
            return None;
        }
        self.set_item(&mut state, key, value.clone(), timeout.into());
        Some(value)
    }

    /// Atualiza apenas se `key` existir. Retorna `None` se não existia.
    pub fn update(&self, key: K, value: V, timeout: impl Into<Timeout>) -> Option<V> {
        let mut state = self.shared.state.lock();
        state.live(&key)?;
        self.set_item(&mut state, key, value.clone(), timeout.into());
        Some(value)
    }

    /// Retorna o valor atual de `key` ou insere `default` com `timeout`.
    pub fn ensure(
        &self,
        key: K,
        default: V,
        timeout: impl Into<Timeout>,
        refresh_on_hit: bool,
    ) -> V {
        self.ensure_with(key, |_, _| default, timeout, refresh_on_hit)
    }

    /// Como [`ensure`](Self::ensure), mas o default só é calculado na ausência da chave.
    /// A factory recebe a chave e o próprio mapa.
    pub fn ensure_with<F>(
        &self,
        key: K,
        factory: F,
        timeout: impl Into<Timeout>,
        refresh_on_hit: bool,
    ) -> V
    where
        F: FnOnce(&K, &Self) -> V,
    {
        if let Some(value) = self.lookup(&key, refresh_on_hit) {
            return value;
        }
        // A factory roda sem o lock: ela pode ler o próprio mapa.
        let value = factory(&key, self);
        self.set(key, value, timeout)
    }

    /// Remove `key`, cancelando seu timer.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = {
            let mut state = self.shared.state.lock();
            if state.purge_if_expired(key) {
                return None;
            }
            state.remove(key)?
        };
        if let Some(timer) = entry.timer {
            timer.cancel();
        }
        Some(entry.value)
    }

    /// Remove toda entrada cujo `(valor, chave)` satisfaz `predicate`.
    pub fn sweep<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&V, &K) -> bool,
    {
        let doomed: Vec<K> = self
            .entries()
            .into_iter()
            .filter(|(key, value)| predicate(value, key))
            .map(|(key, _)| key)
            .collect();

        let removed = {
            let mut state = self.shared.state.lock();
            doomed
                .iter()
                .filter_map(|key| state.remove(key))
                .collect::<Vec<_>>()
        };

        debug!(count = removed.len(), "sweep concluído");
        removed.len()
    }

    /// Remove todas as entradas. Retorna quantas estavam vivas.
    pub fn clear(&self) -> usize {
        self.sweep(|_, _| true)
    }

    // --- Leituras ---

    fn lookup<Q>(&self, key: &Q, refresh: bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.shared.state.lock();
        let entry = state.live(key)?;
        if refresh && let Some(timer) = entry.timer.as_mut() {
            timer.refresh();
        }
        Some(entry.value.clone())
    }

    /// Lê `key` renovando seu timer (expiração deslizante).
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, true)
    }

    /// Lê `key` sem tocar no timer.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, false)
    }

    fn lookup_at(&self, index: isize, refresh: bool) -> Option<V> {
        let mut state = self.shared.state.lock();
        state.purge_expired();
        let key = state.key_at(index)?;
        let entry = state.data.get_mut(&key)?;
        if refresh && let Some(timer) = entry.timer.as_mut() {
            timer.refresh();
        }
        Some(entry.value.clone())
    }

    /// Acesso posicional na ordem de inserção; `-1` é o último. Renova o timer.
    pub fn at(&self, index: isize) -> Option<V> {
        self.lookup_at(index, true)
    }

    pub fn peek_at(&self, index: isize) -> Option<V> {
        self.lookup_at(index, false)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.state.lock().live(key).is_some()
    }

    /// Tempo de vida restante de `key`.
    pub fn ttl<Q>(&self, key: &Q) -> Option<Ttl>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.state.lock().live(key).map(|entry| entry.ttl())
    }

    /// Duração configurada do timer de `key`.
    pub fn timeout<Q>(&self, key: &Q) -> Option<Ttl>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.state.lock().live(key).map(|entry| entry.timeout())
    }

    pub fn len(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.purge_expired();
        state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Iteração ---

    /// Pares `(chave, valor)` na ordem de inserção, como estão agora.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut state = self.shared.state.lock();
        state.purge_expired();
        state
            .ordered()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        let mut state = self.shared.state.lock();
        state.purge_expired();
        state.ordered().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<V> {
        let mut state = self.shared.state.lock();
        state.purge_expired();
        state.ordered().map(|(_, entry)| entry.value.clone()).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<(K, V)> {
        self.entries().into_iter()
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&V, &K, &Self),
    {
        for (key, value) in self.entries() {
            f(&value, &key, self);
        }
    }

    // --- Travessias somente leitura ---

    pub fn first(&self) -> Option<(K, V)> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<(K, V)> {
        self.iter().next_back()
    }

    /// Até `count` entradas do início.
    pub fn first_n(&self, count: usize) -> Vec<(K, V)> {
        self.iter().take(count).collect()
    }

    /// Até `count` entradas do fim, na ordem de inserção. `count` maior que o
    /// tamanho retorna o mapa inteiro.
    pub fn last_n(&self, count: usize) -> Vec<(K, V)> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(count);
        entries.into_iter().skip(skip).collect()
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<V>
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        self.iter()
            .find(|(key, value)| predicate(value, key, self))
            .map(|(_, value)| value)
    }

    pub fn find_key<F>(&self, mut predicate: F) -> Option<K>
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        self.iter()
            .find(|(key, value)| predicate(value, key, self))
            .map(|(key, _)| key)
    }

    pub fn every<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        self.iter().all(|(key, value)| predicate(&value, &key, self))
    }

    pub fn some<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        self.iter().any(|(key, value)| predicate(&value, &key, self))
    }

    pub fn has_all<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().all(|key| self.contains_key(key))
    }

    pub fn has_any<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().any(|key| self.contains_key(key))
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, V> IntoIterator for &'a ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> fmt::Display for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        write!(f, "{{")?;
        let live = state.ordered().filter(|(_, entry)| !entry.is_expired());
        for (i, (key, entry)) in live.enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {}", entry.value)?;
        }
        write!(f, "}}")
    }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_map()
            .entries(state.ordered().filter(|(_, entry)| !entry.is_expired()))
            .finish()
    }
}
