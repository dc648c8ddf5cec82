use crate::error::Result;
use crate::state::{Attributes, DesiredState, Ensure, Observed, ResourceId};
use async_trait::async_trait;

/// The one network mutation a flush performs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mutation<'a, A> {
    Create {
        name: &'a str,
        attributes: &'a A,
    },
    Update {
        id: &'a ResourceId,
        name: &'a str,
        attributes: &'a A,
    },
    Delete {
        id: &'a ResourceId,
    },
}

/// Remote access for one kind of resource.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    type Attributes: Attributes;

    /// Kind name, for logging.
    fn kind(&self) -> &'static str;

    /// Look up the record with this display name. Never cached.
    async fn read(&self, name: &str) -> Result<Observed<Self::Attributes>>;

    /// Perform exactly one mutating call.
    async fn flush(&self, mutation: Mutation<'_, Self::Attributes>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Create,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report<A> {
    pub action: Action,
    pub changed: Vec<&'static str>,
    pub state: Observed<A>,
}

/// Converges a single resource identity.
///
/// The remote state is read at most once per pass and memoized; `create` and
/// `destroy` only record intent, `flush` is the single point which talks to the
/// server in a mutating way and re-reads afterwards.
pub struct Provider<C: ResourceClient> {
    client: C,
    desired: DesiredState<C::Attributes>,
    cached: Option<Observed<C::Attributes>>,
    pending: Option<Ensure>,
}

impl<C: ResourceClient> Provider<C> {
    pub fn new(client: C, desired: DesiredState<C::Attributes>) -> Self {
        Self {
            client,
            desired,
            cached: None,
            pending: None,
        }
    }

    pub fn desired(&self) -> &DesiredState<C::Attributes> {
        &self.desired
    }

    /// The memoized remote state, if it was read already.
    pub fn cached(&self) -> Option<&Observed<C::Attributes>> {
        self.cached.as_ref()
    }

    pub async fn exists(&mut self) -> Result<bool> {
        Ok(self.cached_instance().await?.ensure() == Ensure::Present)
    }

    pub fn create(&mut self) {
        self.pending = Some(Ensure::Present);
    }

    pub fn destroy(&mut self) {
        self.pending = Some(Ensure::Absent);
    }

    /// Apply the pending change and re-read the remote state.
    ///
    /// Without a prior `create`/`destroy` the desired ensure is applied. Deleting a
    /// record which was never found is a no-op. On failure the cache keeps the
    /// last completed read.
    pub async fn flush(&mut self) -> Result<()> {
        let ensure = self.pending.take().unwrap_or(self.desired.ensure);
        let cached = self.cached_instance().await?.clone();
        let desired = &self.desired;

        let mutation = match (ensure, cached.id()) {
            (Ensure::Absent, None) => None,
            (Ensure::Absent, Some(id)) => Some(Mutation::Delete { id }),
            (Ensure::Present, None) => Some(Mutation::Create {
                name: &desired.name,
                attributes: &desired.attributes,
            }),
            (Ensure::Present, Some(id)) => Some(Mutation::Update {
                id,
                name: &desired.name,
                attributes: &desired.attributes,
            }),
        };

        match mutation {
            Some(mutation) => {
                log::debug!("{} '{}': {mutation:?}", self.client.kind(), desired.name);
                self.client.flush(mutation).await?;
            }
            None => {
                log::debug!(
                    "{} '{}': nothing to delete",
                    self.client.kind(),
                    desired.name
                );
            }
        }

        self.cached = None;
        self.cached_instance().await?;
        Ok(())
    }

    /// Run one full pass: read, compare, and flush if anything diverges.
    pub async fn converge(&mut self) -> Result<Report<C::Attributes>> {
        let exists = self.exists().await?;

        let (action, changed) = match (self.desired.ensure, exists) {
            (Ensure::Present, false) => {
                self.create();
                (Action::Create, Vec::new())
            }
            (Ensure::Absent, true) => {
                self.destroy();
                (Action::Delete, Vec::new())
            }
            (Ensure::Absent, false) => (Action::None, Vec::new()),
            (Ensure::Present, true) => {
                let changed = match self.cached.as_ref().and_then(Observed::attributes) {
                    Some(observed) => self.desired.attributes.diff(observed),
                    None => Vec::new(),
                };
                if changed.is_empty() {
                    (Action::None, changed)
                } else {
                    (Action::Update, changed)
                }
            }
        };

        if action != Action::None {
            self.flush().await?;
        }

        Ok(Report {
            action,
            changed,
            state: self.cached_instance().await?.clone(),
        })
    }

    async fn cached_instance(&mut self) -> Result<&Observed<C::Attributes>> {
        let observed = match self.cached.take() {
            Some(observed) => observed,
            None => self.client.read(&self.desired.name).await?,
        };
        Ok(self.cached.insert(observed))
    }
}
