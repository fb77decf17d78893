// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command};
use std::path::Path;
use tessera::{Dataset, Engine, EngineConfig, SeriesOrder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = Engine::with_config(config)?;

    match args.command {
        Command::Detect { files, ai_response } => {
            let datasets = files
                .iter()
                .map(|f| load_dataset(f))
                .collect::<Result<Vec<_>>>()?;
            if datasets.len() < 2 {
                warn!("Relationship detection needs at least two datasets");
            }
            let ai_text = match ai_response {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => None,
            };
            let report = engine.detect(&datasets, ai_text.as_deref());
            info!(source = ?report.source, relationships = report.total(), "Detection finished");
            print_json(&report.attach(&datasets))?;
        }
        Command::Chart {
            file,
            kind,
            x,
            y,
            top,
        } => {
            let dataset = load_dataset(&file)?;
            for column in std::iter::once(&x).chain(y.as_ref()) {
                if let Err(e) = dataset.require_column(column) {
                    warn!("{e}");
                }
            }
            let order = top.map_or(SeriesOrder::FirstSeen, SeriesOrder::TopN);
            let series = engine.build_series(&dataset, kind, &x, y.as_deref(), order);
            if series.is_empty() {
                warn!(chart = %kind, "Data shape does not support this chart");
            }
            print_json(&series)?;
        }
        Command::Suggest { file, query } => {
            let dataset = load_dataset(&file)?;
            match engine.suggest(&dataset, &query) {
                Some(suggestion) => print_json(&suggestion)?,
                None => bail!("cannot visualise '{}' automatically", dataset.name),
            }
        }
    }
    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let dataset = if is_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Dataset::from_json_records(name, &value)?
    } else {
        Dataset::from_csv_path(path)?
    };
    info!(
        dataset = %dataset.name,
        columns = dataset.columns.len(),
        rows = dataset.row_count(),
        "Dataset loaded"
    );
    Ok(dataset)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
