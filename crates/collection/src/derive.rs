use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::trace;

use crate::store::ExpiringMap;
use crate::timer::Timeout;

/// Entrada pronta para ser copiada para outro mapa, com o timeout já derivado.
struct Transplant<K, V> {
    key: K,
    value: V,
    timeout: Timeout,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Captura as entradas vivas com o timeout que cada cópia deve receber.
    /// Entradas vencidas ficam de fora.
    fn transplants(&self, refresh: bool) -> Vec<Transplant<K, V>> {
        let state = self.shared.state.lock();
        let mut skipped = 0usize;
        let out = state
            .ordered()
            .filter_map(|(key, entry)| match entry.carried_timeout(refresh) {
                Some(timeout) => Some(Transplant {
                    key: key.clone(),
                    value: entry.value.clone(),
                    timeout,
                }),
                None => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            trace!(skipped, "entradas vencidas ignoradas na cópia");
        }
        out
    }

    fn transplant_into(dest: &Self, item: Transplant<K, V>) {
        dest.set(item.key, item.value, item.timeout);
    }

    fn collect_into<I>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = Transplant<K, V>>,
    {
        let dest = self.empty_like();
        for item in items {
            Self::transplant_into(&dest, item);
        }
        dest
    }

    /// Novo mapa com todas as entradas.
    ///
    /// `refresh = true` dá a cada cópia a duração cheia do timer original;
    /// `false` preserva a contagem regressiva atual.
    pub fn duplicate(&self, refresh: bool) -> Self {
        self.collect_into(self.transplants(refresh))
    }

    /// Novo mapa só com as entradas que satisfazem `predicate(valor, chave, mapa)`.
    pub fn filter<F>(&self, mut predicate: F, refresh: bool) -> Self
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        let items = self.transplants(refresh);
        self.collect_into(
            items
                .into_iter()
                .filter(|item| predicate(&item.value, &item.key, self)),
        )
    }

    /// Aplica `f` a cada entrada, na ordem de inserção.
    pub fn map<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&V, &K, &Self) -> T,
    {
        self.entries()
            .into_iter()
            .map(|(key, value)| f(&value, &key, self))
            .collect()
    }

    /// Separa as entradas em `(aprovadas, reprovadas)`.
    pub fn partition<F>(&self, mut predicate: F, refresh: bool) -> (Self, Self)
    where
        F: FnMut(&V, &K, &Self) -> bool,
    {
        let pass = self.empty_like();
        let fail = self.empty_like();
        for item in self.transplants(refresh) {
            let dest = if predicate(&item.value, &item.key, self) {
                &pass
            } else {
                &fail
            };
            Self::transplant_into(dest, item);
        }
        (pass, fail)
    }

    /// Copia as entradas de `other` para este mapa. Chaves já presentes aqui
    /// não são tocadas.
    pub fn concat(&self, other: &Self, refresh: bool) -> &Self {
        if self.same_as(other) {
            return self;
        }
        for item in other.transplants(refresh) {
            self.ensure(item.key, item.value, item.timeout, false);
        }
        self
    }

    /// Entradas cuja chave existe em exatamente um dos dois mapas.
    pub fn difference(&self, other: &Self, refresh: bool) -> Self {
        if self.same_as(other) {
            return self.empty_like();
        }
        let ours = self.transplants(refresh);
        let theirs = other.transplants(refresh);

        let our_keys: HashSet<K> = ours.iter().map(|item| item.key.clone()).collect();
        let their_keys: HashSet<K> = theirs.iter().map(|item| item.key.clone()).collect();

        let only_ours = ours
            .into_iter()
            .filter(|item| !their_keys.contains(&item.key));
        let only_theirs = theirs
            .into_iter()
            .filter(|item| !our_keys.contains(&item.key));
        self.collect_into(only_ours.chain(only_theirs))
    }

    /// Reordena o mapa no lugar por `compare(a, b, chave_a, chave_b)`.
    /// Ordenação estável; o mapa é limpo e repovoado, então os timers seguem
    /// as mesmas regras de cópia.
    pub fn sort_by<F>(&self, mut compare: F, refresh: bool) -> &Self
    where
        F: FnMut(&V, &V, &K, &K) -> Ordering,
    {
        let mut items = self.transplants(refresh);
        items.sort_by(|a, b| compare(&a.value, &b.value, &a.key, &b.key));

        self.clear();
        for item in items {
            Self::transplant_into(self, item);
        }
        self
    }

    /// Ordena pela representação textual dos valores.
    pub fn sort(&self, refresh: bool) -> &Self
    where
        V: ToString,
    {
        self.sort_by(|a, b, _, _| a.to_string().cmp(&b.to_string()), refresh)
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + 'static,
{
    /// Entradas presentes nos dois mapas com valores iguais.
    pub fn intersect(&self, other: &Self, refresh: bool) -> Self {
        if self.same_as(other) {
            return self.duplicate(refresh);
        }
        let theirs: HashMap<K, V> = other.entries().into_iter().collect();
        let items = self.transplants(refresh);
        self.collect_into(
            items
                .into_iter()
                .filter(|item| theirs.get(&item.key) == Some(&item.value)),
        )
    }
}

/// Igualdade estrutural: mesmas chaves com valores iguais. Timers não contam.
impl<K, V> PartialEq for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        if self.same_as(other) {
            return true;
        }
        let ours = self.entries();
        let theirs: HashMap<K, V> = other.entries().into_iter().collect();
        ours.len() == theirs.len()
            && ours
                .iter()
                .all(|(key, value)| theirs.get(key) == Some(value))
    }
}

/// Cópia que preserva o tempo restante de cada entrada.
impl<K, V> Clone for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        self.duplicate(false)
    }
}
