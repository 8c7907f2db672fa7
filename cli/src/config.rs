use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerCliConfig {
    /// SQLite file holding the ledger and the settings.
    pub database_path: Option<String>,
    /// JSON directory snapshot served instead of the network.
    pub snapshot_path: Option<String>,
    /// Progress updates that may queue up before the run waits on the printer.
    pub progress_buffer_size: Option<usize>,
}

impl BlockerCliConfig {
    pub fn new(
        database_path: Option<String>,
        snapshot_path: Option<String>,
        progress_buffer_size: Option<usize>,
    ) -> Self {
        Self {
            database_path,
            snapshot_path,
            progress_buffer_size,
        }
    }

    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        r#"{"databasePath": "blocks.db", "progressBufferSize": 4}"#,
        Some("blocks.db"),
        None,
        Some(4)
    )]
    #[case(r#"{"snapshotPath": "directory.json"}"#, None, Some("directory.json"), None)]
    #[case("{}", None, None, None)]
    fn loads_camel_case_fields(
        #[case] json: &str,
        #[case] database_path: Option<&str>,
        #[case] snapshot_path: Option<&str>,
        #[case] progress_buffer_size: Option<usize>,
    ) {
        let config = BlockerCliConfig::load(json.as_bytes()).expect("Valid config");

        assert_eq!(config.database_path.as_deref(), database_path);
        assert_eq!(config.snapshot_path.as_deref(), snapshot_path);
        assert_eq!(config.progress_buffer_size, progress_buffer_size);
    }

    #[rstest]
    #[case("{databasePath")]
    #[case(r#"{"progressBufferSize": "four"}"#)]
    #[case("")]
    fn rejects_malformed_json(#[case] json: &str) {
        assert!(BlockerCliConfig::load(json.as_bytes()).is_err());
    }
}
