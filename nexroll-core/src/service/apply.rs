//! Apply routines shared by the scheduler tick and the management API
//!
//! Every apply follows the same shape: collect local paths, translate them
//! through the configured mappings, refuse values the server platform cannot
//! take, write the preference, and only report success when the readback
//! matched. Settings bookkeeping stays with the caller; this module owns the
//! wire value and the category mirror flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::{
    config::Config,
    models::{Schedule, SequenceStep},
    provider::{self, ProviderError},
    repository::Repositories,
    service::{paths, sequence},
    Error, Result,
};

/// Blend tracking shared with the reconciler, which must not flag drift
/// while a blended pool is live.
#[derive(Default)]
pub struct ApplyState {
    blend_active: AtomicBool,
    blend_expected: Mutex<Option<String>>,
}

impl ApplyState {
    pub fn blend_active(&self) -> bool {
        self.blend_active.load(Ordering::SeqCst)
    }

    pub fn blend_expected(&self) -> Option<String> {
        self.blend_expected.lock().clone()
    }

    fn enter_blend(&self, expected: String) {
        self.blend_active.store(true, Ordering::SeqCst);
        *self.blend_expected.lock() = Some(expected);
    }

    fn leave_blend(&self) {
        self.blend_active.store(false, Ordering::SeqCst);
        *self.blend_expected.lock() = None;
    }
}

#[derive(Clone)]
pub struct Applier {
    repos: Repositories,
    config: Arc<Config>,
    state: Arc<ApplyState>,
}

impl Applier {
    pub fn new(repos: Repositories, config: Arc<Config>) -> Self {
        Self {
            repos,
            config,
            state: Arc::new(ApplyState::default()),
        }
    }

    pub fn state(&self) -> &ApplyState {
        &self.state
    }

    async fn pool_paths(&self, category_id: i64) -> Result<Vec<String>> {
        let pool = self.repos.prerolls.list_by_category(category_id).await?;
        if pool.is_empty() {
            let name = self
                .repos
                .categories
                .get_by_id(category_id)
                .await?
                .map(|c| c.name)
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(Error::State(format!(
                "no prerolls found for category {category_id} ('{name}'); assign prerolls to it"
            )));
        }
        Ok(pool.into_iter().map(|p| p.path).collect())
    }

    async fn pools_for_steps(&self, steps: &[SequenceStep]) -> Result<sequence::SequencePools> {
        let mut pools = sequence::SequencePools::default();
        for category_id in sequence::referenced_categories(steps) {
            let pool = self.repos.prerolls.list_by_category(category_id).await?;
            pools.by_category.insert(category_id, pool);
        }
        for preroll_id in sequence::referenced_prerolls(steps) {
            if let Some(preroll) = self.repos.prerolls.get_by_id(preroll_id).await? {
                pools.by_id.insert(preroll_id, preroll);
            }
        }
        Ok(pools)
    }

    /// Build the final wire value for a path list: translate, preflight, join.
    /// Fails with a `config` error before anything touches the server.
    async fn build_wire_value(&self, local_paths: Vec<String>, delimiter: char) -> Result<String> {
        if let Some(conflict) = paths::find_delimiter_conflict(&local_paths) {
            return Err(Error::Config(format!(
                "path contains a reserved separator and cannot be sent to Plex: {conflict}; \
                 rename the file"
            )));
        }

        let setting = self.repos.settings.get().await?;
        let translator = paths::PathTranslator::new(setting.mappings());
        let translated = translator.translate_all(&local_paths);
        if let Some(conflict) = paths::find_delimiter_conflict(&translated) {
            return Err(Error::Config(format!(
                "translated path contains a reserved separator: {conflict}; fix the path mapping"
            )));
        }

        let server = provider::active_server(&setting, &self.config)?;
        let platform = match server.get_server_info().await {
            Ok(info) => info.platform,
            Err(e) => {
                warn!("could not read server info before apply ({}): {e}", e.kind());
                None
            }
        };
        paths::validate_platform_style(&translated, platform.as_deref())
            .map_err(|mismatch| Error::Config(mismatch.message()))?;

        Ok(translated.join(&delimiter.to_string()))
    }

    async fn send(&self, combined: &str) -> Result<()> {
        let setting = self.repos.settings.get().await?;
        let server = provider::active_server(&setting, &self.config)?;
        let applied = server.set_preroll(combined).await?;
        if !applied {
            return Err(Error::Server(ProviderError::Protocol(
                "preroll value did not survive readback on any setter variant".to_string(),
            )));
        }
        Ok(())
    }

    /// Apply a whole category. The delimiter follows the category's play
    /// mode: playlist joins with `,`, shuffle (the default) with `;`.
    pub async fn apply_category(&self, category_id: i64) -> Result<String> {
        let category = self
            .repos
            .categories
            .get_by_id(category_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("category {category_id}")))?;
        let local_paths = self.pool_paths(category_id).await?;
        let count = local_paths.len();
        let delimiter = category.plex_mode.delimiter();
        let combined = self.build_wire_value(local_paths, delimiter).await?;
        info!(
            "applying category '{}' with {count} prerolls (mode={})",
            category.name,
            category.plex_mode.as_str()
        );
        self.send(&combined).await?;
        self.state.leave_blend();
        self.repos.categories.set_applied(Some(category_id)).await?;
        Ok(combined)
    }

    /// Expand and apply a step list. Sequences are ordered by definition, so
    /// the delimiter is always `,` regardless of any shuffle flag.
    pub async fn apply_steps(
        &self,
        steps: &[SequenceStep],
        mirror_category: Option<i64>,
    ) -> Result<String> {
        let pools = self.pools_for_steps(steps).await?;
        let local_paths = sequence::expand(steps, &pools, &mut rand::rng());
        if local_paths.is_empty() {
            return Err(Error::State("sequence produced no paths".to_string()));
        }
        let count = local_paths.len();
        let combined = self.build_wire_value(local_paths, ',').await?;
        info!("applying sequence with {count} items (ordered)");
        self.send(&combined).await?;
        self.state.leave_blend();
        if let Some(category_id) = mirror_category {
            self.repos.categories.set_applied(Some(category_id)).await?;
        }
        Ok(combined)
    }

    pub async fn apply_schedule_sequence(&self, schedule: &Schedule) -> Result<String> {
        let steps = schedule.sequence_steps();
        if steps.is_empty() {
            return Err(Error::State(format!(
                "schedule '{}' has no usable sequence steps",
                schedule.name
            )));
        }
        self.apply_steps(&steps, Some(schedule.category_id)).await
    }

    pub async fn apply_saved_sequence(&self, sequence_id: i64) -> Result<String> {
        let saved = self
            .repos
            .saved_sequences
            .get_by_id(sequence_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("saved sequence {sequence_id}")))?;
        self.apply_steps(&saved.sequence_steps(), None).await
    }

    /// Blend the contributions of each schedule round-robin into one shuffle
    /// pool, stable-ordered by schedule id.
    pub async fn apply_blend(&self, schedules: &[Schedule]) -> Result<String> {
        let mut contributions = Vec::new();
        for schedule in schedules {
            let steps = schedule.sequence_steps();
            let pools = self.pools_for_steps(&steps).await?;
            let category_pool = self
                .repos
                .prerolls
                .list_by_category(schedule.category_id)
                .await?;
            let contribution =
                sequence::blend_contribution(&steps, &category_pool, &pools, &mut rand::rng());
            if contribution.is_empty() {
                warn!("blend: schedule '{}' contributed no prerolls", schedule.name);
                continue;
            }
            contributions.push(contribution);
        }
        if contributions.is_empty() {
            return Err(Error::State(
                "blend produced no preroll paths from any schedule".to_string(),
            ));
        }

        let interleaved = sequence::interleave(&contributions);
        let count = interleaved.len();
        let combined = self.build_wire_value(interleaved, ';').await?;
        info!(
            "applying blended pool of {count} prerolls from {} schedules (random mode)",
            contributions.len()
        );
        self.send(&combined).await?;
        self.state.enter_blend(combined.clone());
        Ok(combined)
    }

    pub async fn apply_coming_soon(&self, layout: &str) -> Result<String> {
        let setting = self.repos.settings.get().await?;
        let path = setting.filler_coming_soon_path.clone().ok_or_else(|| {
            Error::State(format!(
                "coming-soon filler ({layout}) has no rendered asset configured"
            ))
        })?;
        let combined = self.build_wire_value(vec![path], ';').await?;
        info!("applying coming-soon filler ({layout})");
        self.send(&combined).await?;
        self.state.leave_blend();
        Ok(combined)
    }

    /// Clear the server's preroll preference entirely.
    pub async fn clear(&self) -> Result<()> {
        info!("clearing preroll preference");
        self.send("").await?;
        self.state.leave_blend();
        self.repos.categories.set_applied(None).await?;
        Ok(())
    }

    /// The value the reconciler expects the server to carry for a category.
    /// The delimiter is fixed to `;` because the settings row does not record
    /// the winning mode; a playlist-mode winner can therefore produce a
    /// false-positive drift.
    pub async fn expected_category_value(&self, category_id: i64) -> Result<String> {
        let local_paths = self.pool_paths(category_id).await?;
        let setting = self.repos.settings.get().await?;
        let translator = paths::PathTranslator::new(setting.mappings());
        Ok(translator.translate_all(&local_paths).join(";"))
    }

    /// Read the preference currently on the server.
    pub async fn read_preroll(&self) -> Result<String> {
        let setting = self.repos.settings.get().await?;
        let server = provider::active_server(&setting, &self.config)?;
        Ok(server.get_preroll().await?)
    }
}
