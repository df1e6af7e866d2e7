use serde_json::{Map, Value};
use snafu::{ResultExt as _, Snafu};

use super::*;

/// A stored setting row, keyed by the setting name (`settings:siteName`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Setting {
    pub id: Record<Setting>,
    pub value: Value,
}

define_table!("settings" : Setting);

/// Site wide settings. Keys missing from the store fall back to [Default].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub site_name: String,
    pub site_description: String,
    pub contact_email: String,
    pub max_upload_size: u64,
    pub allow_registration: bool,
    pub maintenance_mode: bool,
    pub analytics_id: String,
    pub featured_videos_count: u64,
    pub default_page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            site_name: "VR Hub".to_string(),
            site_description: "The best platform for VR videos".to_string(),
            contact_email: "contact@vrhub.com".to_string(),
            max_upload_size: 1024,
            allow_registration: true,
            maintenance_mode: false,
            analytics_id: String::new(),
            featured_videos_count: 6,
            default_page_size: 12,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("setting '{key}' has the wrong type: {source}"))]
pub struct InvalidSetting {
    pub key: String,
    source: serde_json::Error,
}

#[derive(Debug, Deserialize)]
struct StoredSetting {
    key: String,
    value: Value,
}

impl Settings {
    fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Overlays `changes` on top of `self`, skipping unknown keys and rejecting values of the wrong type.
    ///
    /// Returns the merged settings together with the keys that actually apply.
    pub fn apply(&self, changes: &Map<String, Value>) -> Result<(Settings, Vec<(String, Value)>), InvalidSetting> {
        let mut merged = self.to_map();
        let mut accepted = Vec::new();

        for (key, value) in changes {
            if !merged.contains_key(key) {
                continue;
            }

            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value.clone());
            serde_json::from_value::<Settings>(Value::Object(candidate))
                .context(InvalidSettingSnafu { key })?;

            merged.insert(key.clone(), value.clone());
            accepted.push((key.clone(), value.clone()));
        }

        let settings = serde_json::from_value(Value::Object(merged)).context(InvalidSettingSnafu {
            key: String::new(),
        })?;
        Ok((settings, accepted))
    }

    /// Loads the stored values merged over the defaults. A stored value that no longer fits is ignored.
    #[tracing::instrument(skip(db))]
    pub async fn load(db: &Database) -> Result<Settings, DatabaseQueryError> {
        let stored: Vec<StoredSetting> = db
            .sql("SELECT meta::id(id) AS key, value FROM settings")
            .fetch_first()
            .await?;

        let mut settings = Settings::default();
        for StoredSetting { key, value } in stored {
            let change = Map::from_iter([(key.clone(), value)]);
            match settings.apply(&change) {
                Ok((merged, _)) => settings = merged,
                Err(error) => tracing::warn!(%error, "ignoring stored setting"),
            }
        }

        Ok(settings)
    }

    /// Writes every accepted change in one transaction.
    #[tracing::instrument(skip(db))]
    pub async fn save(changes: &[(String, Value)], db: &Database) -> Result<(), DatabaseQueryError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for index in 0..changes.len() {
            sql.push_str(&format!("UPDATE $setting_{index} SET value = $value_{index};\n"));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = db.sql(sql);
        for (index, (key, value)) in changes.iter().enumerate() {
            query = query
                .bind((format!("setting_{index}"), Record::<Setting>::new(key.clone())))
                .bind((format!("value_{index}"), value));
        }

        query.execute().await?;
        Ok(())
    }
}
