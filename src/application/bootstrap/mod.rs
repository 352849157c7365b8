pub mod persistence;

pub use persistence::{EngineContext, PersistenceBootstrap, PersistenceHandle};
