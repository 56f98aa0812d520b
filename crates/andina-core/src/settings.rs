use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::time_utils::Period;

/// Environment variable that overrides the default data directory.
pub const DATA_DIR_ENV: &str = "ANDINA_DATA_DIR";

// ── Enumerated options ────────────────────────────────────────────────────────

/// Dashboard view to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ViewName {
    Overview,
    Profitability,
    Customers,
    Imports,
    Inventory,
    CreditRisk,
    All,
}

impl ViewName {
    /// Every concrete view, in navigation order.
    pub const ALL_VIEWS: [ViewName; 6] = [
        ViewName::Overview,
        ViewName::Profitability,
        ViewName::Customers,
        ViewName::Imports,
        ViewName::Inventory,
        ViewName::CreditRisk,
    ];

    /// Views selected by this option (`All` expands to every view).
    pub fn expand(&self) -> Vec<ViewName> {
        match self {
            ViewName::All => Self::ALL_VIEWS.to_vec(),
            other => vec![*other],
        }
    }

    /// Navigation title shown by the dashboard.
    pub fn title(&self) -> &'static str {
        match self {
            ViewName::Overview => "Resumen General",
            ViewName::Profitability => "Rentabilidad",
            ViewName::Customers => "Clientes",
            ViewName::Imports => "Importaciones",
            ViewName::Inventory => "Inventario",
            ViewName::CreditRisk => "Riesgo Crediticio",
            ViewName::All => "Todas",
        }
    }
}

/// How reports are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// ── Settings (CLI) ────────────────────────────────────────────────────────────

/// Sales, margin, inventory and credit dashboard for Comercializadora Andina
#[derive(Parser, Debug, Clone)]
#[command(
    name = "andina-dashboard",
    about = "Sales, margin, inventory and credit dashboard for Comercializadora Andina",
    version
)]
pub struct Settings {
    /// Directory holding the *_andina.csv / *_andina.json exports
    #[arg(long, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// View to build
    #[arg(long, value_enum, default_value_t = ViewName::All)]
    pub view: ViewName,

    /// Restrict the profitability view to one product category
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict the customers view to one segment
    #[arg(long)]
    pub segment: Option<String>,

    /// Bucket size for trend insights
    #[arg(long, value_enum, default_value_t = Period::Monthly)]
    pub period: Period,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and resolve derived values.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list, for tests.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    /// Directory to load data from: the explicit option, else `~/.andina/data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        default_data_dir()
    }

    /// `--debug` overrides the log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

/// `~/.andina/data`, or `./.andina/data` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".andina")
        .join("data")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
