pub mod config {
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        #[serde(default = "default_port")]
        pub port: u16,
        /// Location of the JSON document holding every task.
        #[serde(default = "default_db_file")]
        pub db_file: PathBuf,
        /// Largest request body accepted by the task API.
        #[serde(default = "default_max_body_bytes")]
        pub max_body_bytes: usize,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    impl Default for Config {
        fn default() -> Self {
            Self {
                port: default_port(),
                db_file: default_db_file(),
                max_body_bytes: default_max_body_bytes(),
            }
        }
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_db_file() -> PathBuf {
        PathBuf::from("tasks-db.json")
    }

    fn default_max_body_bytes() -> usize {
        1_000_000
    }

}
pub mod task;
pub mod web;
