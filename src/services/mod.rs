pub mod cell_edit;
pub mod connection_manager;
pub mod mirror_service;
pub mod query_service;
pub mod remote; // Remote source adapters: SQLite file, PostgreSQL, MySQL
pub mod schema_translator;
pub mod transfer;
pub mod type_mapper;

pub use cell_edit::CellEditor;
pub use connection_manager::ConnectionManager;
pub use mirror_service::MirrorService;
pub use query_service::QueryService;
pub use remote::{RemoteKind, RemoteSource, RowCursor};
pub use schema_translator::{InsertStatement, SchemaTranslator};
pub use transfer::RowTransfer;
pub use type_mapper::TypeMapper;
