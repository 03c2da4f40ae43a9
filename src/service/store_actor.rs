use crate::config::StorageMode;
use crate::db::{Collection, JsonFileStore, Record};
use crate::error::PortalError;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info, warn};

pub type Rows = Vec<Value>;
type MutationOutput = Box<dyn Any + Send>;
type Mutation = Box<dyn FnOnce(&mut Rows) -> Result<MutationOutput, PortalError> + Send>;

/// Messages handled by the store actor.
pub enum StoreMessage {
    /// Copy of a collection as it is now.
    Snapshot(Collection, RpcReplyPort<Result<Rows, PortalError>>),
    /// Run a read-modify-write job against a collection. The collection is
    /// only replaced (and persisted) when the job returns `Ok`.
    Mutate(
        Collection,
        Mutation,
        RpcReplyPort<Result<MutationOutput, PortalError>>,
    ),
}

/// Handle for interacting with the store actor.
#[derive(Clone)]
pub struct StoreHandle {
    actor: ActorRef<StoreMessage>,
}

impl StoreHandle {
    /// Typed snapshot of a collection.
    pub async fn list<T>(&self, collection: Collection) -> Result<Vec<T>, PortalError>
    where
        T: DeserializeOwned,
    {
        let rows = ractor::call!(self.actor, StoreMessage::Snapshot, collection)
            .map_err(|e| PortalError::StoreUnavailable(format!("Snapshot RPC failed: {e}")))??;
        decode_rows(&rows)
    }

    pub async fn find<T>(&self, collection: Collection, id: &str) -> Result<Option<T>, PortalError>
    where
        T: DeserializeOwned + Record,
    {
        Ok(self
            .list::<T>(collection)
            .await?
            .into_iter()
            .find(|r| r.id() == id))
    }

    /// Run `f` against the typed collection with exclusive access.
    pub async fn mutate<T, R, F>(&self, collection: Collection, f: F) -> Result<R, PortalError>
    where
        T: DeserializeOwned + Serialize + 'static,
        R: Send + 'static,
        F: FnOnce(&mut Vec<T>) -> Result<R, PortalError> + Send + 'static,
    {
        let job: Mutation = Box::new(move |rows: &mut Rows| {
            let mut typed: Vec<T> = decode_rows(rows)?;
            let out = f(&mut typed)?;
            *rows = encode_rows(&typed)?;
            Ok(Box::new(out) as MutationOutput)
        });
        let out = ractor::call!(self.actor, StoreMessage::Mutate, collection, job)
            .map_err(|e| PortalError::StoreUnavailable(format!("Mutate RPC failed: {e}")))??;
        out.downcast::<R>().map(|b| *b).map_err(|_| {
            PortalError::StoreUnavailable(format!("{collection}: mutation result type mismatch"))
        })
    }

    /// Append one record and hand it back.
    pub async fn insert<T>(&self, collection: Collection, record: T) -> Result<T, PortalError>
    where
        T: DeserializeOwned + Serialize + Clone + Send + 'static,
    {
        self.mutate(collection, move |rows: &mut Vec<T>| {
            rows.push(record.clone());
            Ok(record)
        })
        .await
    }

    /// Remove the record with `id`. Returns the removed record, if any.
    pub async fn remove<T>(&self, collection: Collection, id: &str) -> Result<Option<T>, PortalError>
    where
        T: DeserializeOwned + Serialize + Record + Send + 'static,
    {
        let id = id.to_string();
        self.mutate(collection, move |rows: &mut Vec<T>| {
            Ok(rows
                .iter()
                .position(|r| r.id() == id)
                .map(|idx| rows.remove(idx)))
        })
        .await
    }
}

fn decode_rows<T: DeserializeOwned>(rows: &[Value]) -> Result<Vec<T>, PortalError> {
    rows.iter()
        .cloned()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(PortalError::from)
}

fn encode_rows<T: Serialize>(rows: &[T]) -> Result<Rows, PortalError> {
    rows.iter()
        .map(serde_json::to_value)
        .collect::<Result<Rows, _>>()
        .map_err(PortalError::from)
}

/// Startup arguments for the store actor.
pub struct StoreArgs {
    pub files: JsonFileStore,
    pub mode: StorageMode,
}

/// Internal state held by the store actor
struct StoreState {
    files: JsonFileStore,
    mode: StorageMode,
    cache: HashMap<Collection, Rows>,
}

impl StoreState {
    async fn load(&mut self, collection: Collection) -> Result<&mut Rows, PortalError> {
        match self.cache.entry(collection) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let rows = match self.mode {
                    StorageMode::File => self.files.read_collection(collection).await?,
                    StorageMode::Memory => self
                        .files
                        .read_existing(collection)
                        .await?
                        .unwrap_or_default(),
                };
                debug!(collection = %collection, count = rows.len(), "collection cached");
                Ok(e.insert(rows))
            }
        }
    }

    async fn apply(
        &mut self,
        collection: Collection,
        job: Mutation,
    ) -> Result<MutationOutput, PortalError> {
        let current = self.load(collection).await?;
        let mut working = current.clone();
        let out = job(&mut working)?;

        if *current == working {
            return Ok(out);
        }
        if self.mode == StorageMode::File {
            self.files.write_collection(collection, &working).await?;
        }
        self.cache.insert(collection, working);
        Ok(out)
    }
}

/// ractor-based owner of every collection
struct StoreActor;

#[ractor::async_trait]
impl Actor for StoreActor {
    type Msg = StoreMessage;
    type State = StoreState;
    type Arguments = StoreArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            data_dir = %args.files.dir().display(),
            mode = ?args.mode,
            "StoreActor starting"
        );
        Ok(StoreState {
            files: args.files,
            mode: args.mode,
            cache: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreMessage::Snapshot(collection, rp) => {
                let res = state.load(collection).await.map(|rows| rows.clone());
                if let Err(e) = &res {
                    warn!(collection = %collection, error = %e, "collection load failed");
                }
                let _ = rp.send(res);
            }
            StoreMessage::Mutate(collection, job, rp) => {
                let res = state.apply(collection, job).await;
                if let Err(e) = &res {
                    debug!(collection = %collection, error = %e, "mutation rejected");
                }
                let _ = rp.send(res);
            }
        }
        Ok(())
    }
}

/// Spawn the store actor and return a handle.
pub async fn spawn(files: JsonFileStore, mode: StorageMode) -> Result<StoreHandle, PortalError> {
    let (actor, _jh) = Actor::spawn(None, StoreActor, StoreArgs { files, mode })
        .await
        .map_err(|e| PortalError::StoreUnavailable(format!("failed to spawn StoreActor: {e}")))?;
    Ok(StoreHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::db::models::{BulletinPost, new_id};
    use chrono::Utc;

    fn post(title: &str) -> BulletinPost {
        BulletinPost {
            id: new_id(),
            title: title.to_string(),
            content: "body".to_string(),
            important: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user_id: "u1".to_string(),
            user_name: "Resident".to_string(),
        }
    }

    #[tokio::test]
    async fn concurrent_inserts_are_not_lost() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = spawn(JsonFileStore::new(dir), StorageMode::File)
            .await
            .unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(Collection::Bulletin, post(&format!("post {i}")))
                        .await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let posts: Vec<BulletinPost> = store.list(Collection::Bulletin).await.unwrap();
        assert_eq!(posts.len(), 20);

        let on_disk: Vec<Value> =
            serde_json::from_slice(&std::fs::read(dir.join("bulletin.json")).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 20);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_collection_untouched() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = spawn(JsonFileStore::new(dir), StorageMode::File)
            .await
            .unwrap();
        store.insert(Collection::Bulletin, post("keep")).await.unwrap();

        let res: Result<(), _> = store
            .mutate(Collection::Bulletin, |rows: &mut Vec<BulletinPost>| {
                rows.clear();
                Err(PortalError::bad_request("nope"))
            })
            .await;
        assert!(matches!(res, Err(PortalError::BadRequest(_))));

        let posts: Vec<BulletinPost> = store.list(Collection::Bulletin).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn memory_mode_never_writes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = spawn(JsonFileStore::new(dir), StorageMode::Memory)
            .await
            .unwrap();

        let created = store.insert(Collection::Bulletin, post("volatile")).await.unwrap();
        let found: Option<BulletinPost> = store.find(Collection::Bulletin, &created.id).await.unwrap();
        assert_eq!(found.map(|p| p.title), Some("volatile".to_string()));
        assert!(!dir.join("bulletin.json").exists());
    }

    #[tokio::test]
    async fn remove_returns_the_record() {
        let tmp = TempDir::new().unwrap();
        let store = spawn(JsonFileStore::new(tmp.path()), StorageMode::Memory)
            .await
            .unwrap();
        let created = store.insert(Collection::Bulletin, post("gone")).await.unwrap();

        let removed: Option<BulletinPost> =
            store.remove(Collection::Bulletin, &created.id).await.unwrap();
        assert_eq!(removed.map(|p| p.id), Some(created.id.clone()));

        let again: Option<BulletinPost> =
            store.remove(Collection::Bulletin, &created.id).await.unwrap();
        assert!(again.is_none());
    }
}
