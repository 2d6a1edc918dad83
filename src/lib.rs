#[macro_use]
extern crate rocket;

pub mod dispatch;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::dispatch::{
    BatchDispatcher, BatchStore, DispatchConfig, HttpProviderClient, InMemoryBatchStore,
    ProviderClient, ProviderConfig, RetentionSweeper,
};
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(cors)
        // Wire the batch store, provider client, and dispatcher
        .attach(AdHoc::try_on_ignite("Dispatch State", |rocket| async move {
            let dispatch_config = DispatchConfig::from_env();
            let provider_config = ProviderConfig::from_env();

            let provider: Arc<dyn ProviderClient> =
                match HttpProviderClient::new(provider_config) {
                    Ok(client) => Arc::new(client),
                    Err(err) => {
                        log::error!("failed to initialize provider client: {}", err);
                        return Err(rocket);
                    }
                };

            if dispatch_config.from_email.is_none() {
                log::warn!(
                    "DISPATCH_FROM_EMAIL is not set; batch submissions will be rejected until it is"
                );
            }

            let store: Arc<dyn BatchStore> = Arc::new(InMemoryBatchStore::new());
            let dispatcher = Arc::new(BatchDispatcher::new(
                Arc::clone(&store),
                provider,
                dispatch_config.clone(),
            ));

            Ok(rocket
                .manage(store)
                .manage(dispatcher)
                .manage(dispatch_config))
        }))
        // Spawn retention sweeper in background
        .attach(AdHoc::on_liftoff("Spawn Retention Sweeper", |rocket| {
            Box::pin(async move {
                match (
                    rocket.state::<Arc<dyn BatchStore>>(),
                    rocket.state::<DispatchConfig>(),
                ) {
                    (Some(store), Some(config)) => {
                        let sweeper = RetentionSweeper::new(
                            Arc::clone(store),
                            config.retention,
                            config.sweep_interval,
                        );
                        tokio::spawn(async move {
                            log::info!("starting retention sweeper");
                            sweeper.run().await
                        });
                    }
                    _ => log::error!("failed to spawn retention sweeper: dispatch state not found"),
                }
            })
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Batch routes
                routes::batches::submit_batch,
                routes::batches::get_batch_status,
                // Template routes
                routes::templates::preview_template,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Dispatch API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    //! Helpers for exercising the dispatch engine in tests: a Rocket
    //! builder with the dispatch state pre-wired, deterministic recipient
    //! fixtures, and scriptable provider stubs.

    use crate::dispatch::{BatchDispatcher, BatchProgress, BatchStore, DispatchConfig};
    use crate::models::{BatchStatus, RecipientRecord};
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// Dispatch configuration tuned for fast tests: short pacing, sender
    /// preconfigured.
    pub fn test_dispatch_config() -> DispatchConfig {
        DispatchConfig {
            chunk_size: 100,
            max_recipients: 1000,
            chunk_pacing: Duration::from_millis(10),
            from_email: Some("noreply@dispatch.test".to_string()),
            from_name: Some("Dispatch Test".to_string()),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }

    /// Deterministic recipient records `user0@example.com`, `user1@...`.
    pub fn recipients(count: usize) -> Vec<RecipientRecord> {
        (0..count)
            .map(|i| {
                let mut fields = HashMap::new();
                fields.insert("email".to_string(), format!("user{i}@example.com"));
                fields.insert("name".to_string(), format!("User {i}"));
                RecipientRecord(fields)
            })
            .collect()
    }

    /// Poll the status endpoint until the batch reaches a terminal state.
    pub async fn await_terminal(client: &AsyncClient, batch_id: &str) -> BatchProgress {
        for _ in 0..400 {
            let response = client
                .get(format!("/api/v1/batches/{batch_id}"))
                .dispatch()
                .await;
            let progress: BatchProgress = response.into_json().await.expect("status payload");
            if matches!(progress.status, BatchStatus::Completed | BatchStatus::Failed) {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("batch {batch_id} did not reach a terminal status in time");
    }

    pub mod provider {
        //! Scriptable `ProviderClient` stubs.

        use crate::dispatch::provider::{
            OutboundMessage, ProviderClient, ProviderError, SendOutcome, Sender,
        };
        use parking_lot::Mutex;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Instant;

        /// Accepts every message, recording calls, recipients, subjects,
        /// and call times for assertions.
        #[derive(Default)]
        pub struct AcceptingProvider {
            calls: AtomicUsize,
            recipients: Mutex<Vec<Vec<String>>>,
            subjects: Mutex<Vec<Vec<String>>>,
            times: Mutex<Vec<Instant>>,
        }

        impl AcceptingProvider {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn call_count(&self) -> usize {
                self.calls.load(Ordering::SeqCst)
            }

            /// Recipient addresses per call, in call order.
            pub fn seen_recipients(&self) -> Vec<Vec<String>> {
                self.recipients.lock().clone()
            }

            /// Rendered subjects per call, in call order.
            pub fn seen_subjects(&self) -> Vec<Vec<String>> {
                self.subjects.lock().clone()
            }

            pub fn call_times(&self) -> Vec<Instant> {
                self.times.lock().clone()
            }
        }

        #[rocket::async_trait]
        impl ProviderClient for AcceptingProvider {
            async fn send_batch(
                &self,
                _sender: &Sender,
                messages: &[OutboundMessage],
            ) -> Result<Vec<SendOutcome>, ProviderError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                self.times.lock().push(Instant::now());
                self.recipients
                    .lock()
                    .push(messages.iter().map(|m| m.to.clone()).collect());
                self.subjects
                    .lock()
                    .push(messages.iter().map(|m| m.subject.clone()).collect());

                Ok(messages
                    .iter()
                    .enumerate()
                    .map(|(position, _)| SendOutcome::Accepted {
                        message_id: format!("msg-{call}-{position}"),
                    })
                    .collect())
            }
        }

        /// Rejects every message with a fixed provider error.
        pub struct RejectingProvider {
            error: String,
        }

        impl RejectingProvider {
            pub fn new(error: &str) -> Self {
                Self {
                    error: error.to_string(),
                }
            }
        }

        #[rocket::async_trait]
        impl ProviderClient for RejectingProvider {
            async fn send_batch(
                &self,
                _sender: &Sender,
                messages: &[OutboundMessage],
            ) -> Result<Vec<SendOutcome>, ProviderError> {
                Ok(vec![
                    SendOutcome::Rejected {
                        error: self.error.clone()
                    };
                    messages.len()
                ])
            }
        }

        /// Accepts until the given 1-based call, then errs at the trait
        /// level, which the dispatch loop treats as fatal.
        pub struct ErringProvider {
            fail_on_call: usize,
            calls: AtomicUsize,
        }

        impl ErringProvider {
            pub fn failing_on_call(fail_on_call: usize) -> Self {
                Self {
                    fail_on_call,
                    calls: AtomicUsize::new(0),
                }
            }
        }

        #[rocket::async_trait]
        impl ProviderClient for ErringProvider {
            async fn send_batch(
                &self,
                _sender: &Sender,
                messages: &[OutboundMessage],
            ) -> Result<Vec<SendOutcome>, ProviderError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call == self.fail_on_call {
                    return Err(ProviderError::Fault("provider call exploded".to_string()));
                }

                Ok(messages
                    .iter()
                    .enumerate()
                    .map(|(position, _)| SendOutcome::Accepted {
                        message_id: format!("msg-{call}-{position}"),
                    })
                    .collect())
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        store: Option<Arc<dyn BatchStore>>,
        dispatcher: Option<Arc<BatchDispatcher>>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                store: None,
                dispatcher: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a batch store and dispatcher for routes that need them.
        pub fn manage_dispatch(
            mut self,
            store: Arc<dyn BatchStore>,
            dispatcher: Arc<BatchDispatcher>,
        ) -> Self {
            self.store = Some(store);
            self.dispatcher = Some(dispatcher);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(store) = self.store {
                rocket = rocket.manage(store);
            }
            if let Some(dispatcher) = self.dispatcher {
                rocket = rocket.manage(dispatcher);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
