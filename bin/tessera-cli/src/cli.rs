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

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera::ChartType;

#[derive(Parser, Debug)]
#[command(name = "tessera-cli")]
#[command(about = "Relationship detection and chart aggregation over CSV/JSON datasets")]
#[command(version)]
pub struct Args {
    #[arg(long, global = true, help = "YAML file overriding the engine configuration")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "Set the logging level")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect column relationships between two or more datasets.
    Detect {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Previously generated relationship text to parse first")]
        ai_response: Option<PathBuf>,
    },
    /// Aggregate one dataset into a chart series.
    Chart {
        file: PathBuf,
        #[arg(long, value_parser = parse_chart_type)]
        kind: ChartType,
        #[arg(long)]
        x: String,
        #[arg(long)]
        y: Option<String>,
        #[arg(long, help = "Keep only the N highest groups (bar charts)")]
        top: Option<usize>,
    },
    /// Pick a chart for a free-text request and build its series.
    Suggest {
        file: PathBuf,
        #[arg(long)]
        query: String,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn parse_chart_type(s: &str) -> Result<ChartType, String> {
    s.parse()
}
