use std::sync::Arc;

use admin_adapter_http::AdminAdapterHttp;
use storage_adapter_redb::StorageAdapterRedb;

use dacollab::{Config, ServerOpts};
use dacollab_room::MemoryStorage;
use dacollab_types::storage_adapter::RoomStorage;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let config = Config::from_env();

	let admin = Arc::new(
		AdminAdapterHttp::new(config.admin_base_url.clone()).expect("admin adapter"),
	);

	let storage: Arc<dyn RoomStorage> = match &config.storage_dir {
		Some(dir) => Arc::new(StorageAdapterRedb::new(dir).expect("room storage")),
		None => Arc::new(MemoryStorage::new()),
	};

	dacollab::run(ServerOpts { config, admin, storage }).await.expect("server");
}

// vim: ts=4
