// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for Redis.
//!
//! Provides helpers to spin up Redis containers for integration tests.

use docmover::resilience::RetryConfig;
use docmover::store::RedisStore;
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

/// Create a vanilla Redis container.
///
/// Uses official redis:7 image. Waits for "Ready to accept connections".
pub fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// Get the Redis URL for a container.
pub fn redis_url(container: &Container<'_, GenericImage>) -> String {
    let port = container.get_host_port_ipv4(6379);
    format!("redis://127.0.0.1:{}", port)
}

/// A Redis container with a connected document store on top.
pub struct TestStore<'a> {
    #[allow(dead_code)] // Kept alive for container lifetime
    container: Container<'a, GenericImage>,
    pub url: String,
    pub store: RedisStore,
}

impl<'a> TestStore<'a> {
    /// Start a container and connect a store named `name` to it.
    pub async fn start(docker: &'a Cli, name: &str) -> TestStore<'a> {
        let container = redis_container(docker);
        let url = redis_url(&container);
        let store = RedisStore::connect(name, &url, &RetryConfig::testing())
            .await
            .expect("Failed to connect to test Redis")
            .with_page_size(3);
        Self {
            container,
            url,
            store,
        }
    }

    /// Raw key count, for checking the key layout.
    pub async fn key_count(&self, pattern: &str) -> usize {
        let client = redis::Client::open(self.url.as_str()).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await
            .unwrap();
        keys.len()
    }
}
