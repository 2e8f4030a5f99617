use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::experiment::ParameterSweep;
use crate::domain::errors::ExperimentError;

/// Main configuration structure for swimbench
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BenchConfig {
    /// Sweep dimensions and repetition count
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Node fleet layout
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Builder container and build command
    #[serde(default)]
    pub build: BuildConfig,

    /// Result store container and client
    #[serde(default)]
    pub store: StoreConfig,

    /// Result polling and harvesting
    #[serde(default)]
    pub collect: CollectConfig,

    /// Artifact output
    #[serde(default)]
    pub output: OutputConfig,

    /// Container runtime client
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sweep dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepConfig {
    #[serde(default = "default_members")]
    pub members: Vec<u16>,

    #[serde(default = "default_members_in_update")]
    pub members_in_update: Vec<u16>,

    #[serde(default = "default_fanout")]
    pub fanout: Vec<u16>,

    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_members() -> Vec<u16> {
    vec![8, 16, 32, 64, 128]
}

fn default_members_in_update() -> Vec<u16> {
    vec![2, 3, 4]
}

fn default_fanout() -> Vec<u16> {
    vec![2, 3, 4]
}

const fn default_iterations() -> u32 {
    10
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            members: default_members(),
            members_in_update: default_members_in_update(),
            fanout: default_fanout(),
            iterations: default_iterations(),
        }
    }
}

impl SweepConfig {
    pub fn to_sweep(&self) -> Result<ParameterSweep, ExperimentError> {
        ParameterSweep::new(
            self.members.clone(),
            self.members_in_update.clone(),
            self.fanout.clone(),
            self.iterations,
        )
    }
}

/// Node fleet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FleetConfig {
    /// Image every gossip node runs in
    #[serde(default = "default_node_image")]
    pub image: String,

    /// First port of the contiguous node port block
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Address nodes bind to and reach their peer on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Benchmark binary path inside the node container
    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default = "default_node_working_dir")]
    pub working_dir: String,

    #[serde(default = "default_network_mode")]
    pub network_mode: String,

    /// Host scratch directory, relative to the source dir unless absolute
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default = "default_results_mount")]
    pub results_mount: String,

    /// Host directory holding the compiled binary
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    #[serde(default = "default_build_mount")]
    pub build_mount: String,

    #[serde(default = "default_spawn_workers")]
    pub spawn_workers: usize,

    #[serde(default = "default_teardown_workers")]
    pub teardown_workers: usize,

    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Ignore stop failures and force removal
    #[serde(default)]
    pub force_teardown: bool,

    #[serde(default)]
    pub remove_volumes: bool,
}

fn default_node_image() -> String {
    "microswim".to_string()
}

const fn default_base_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_binary() -> String {
    "./build/benchmarks/convergence/convergence".to_string()
}

fn default_node_working_dir() -> String {
    "/microswim".to_string()
}

fn default_network_mode() -> String {
    "host".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_results_mount() -> String {
    "/tmp".to_string()
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_build_mount() -> String {
    "/microswim/build".to_string()
}

const fn default_spawn_workers() -> usize {
    8
}

const fn default_teardown_workers() -> usize {
    8
}

const fn default_stop_timeout_secs() -> u64 {
    2
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            image: default_node_image(),
            base_port: default_base_port(),
            bind_address: default_bind_address(),
            binary: default_binary(),
            working_dir: default_node_working_dir(),
            network_mode: default_network_mode(),
            results_dir: default_results_dir(),
            results_mount: default_results_mount(),
            build_dir: default_build_dir(),
            build_mount: default_build_mount(),
            spawn_workers: default_spawn_workers(),
            teardown_workers: default_teardown_workers(),
            stop_timeout_secs: default_stop_timeout_secs(),
            force_teardown: false,
            remove_volumes: false,
        }
    }
}

/// Builder container configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildConfig {
    #[serde(default = "default_builder_image")]
    pub image: String,

    /// Source root on the host; the current directory when unset
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    #[serde(default = "default_source_mount")]
    pub source_mount: String,

    /// Shell used to run `script`
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    /// Configure + compile script
    #[serde(default = "default_build_script")]
    pub script: String,
}

fn default_builder_image() -> String {
    "microswim-builder".to_string()
}

fn default_source_mount() -> String {
    "/src".to_string()
}

fn default_shell() -> Vec<String> {
    vec!["bash".to_string(), "-lc".to_string()]
}

fn default_build_script() -> String {
    "cmake -DBUILD_TESTS=0 -DBUILD_BENCHMARKS=1 -DBUILD_EXAMPLES=0 \
     -DCUSTOM_CONFIGURATION=1 -DCBOR=1 -DJSON=0 -B build -S . && cmake --build build"
        .to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image: default_builder_image(),
            source_dir: None,
            source_mount: default_source_mount(),
            shell: default_shell(),
            script: default_build_script(),
        }
    }
}

impl BuildConfig {
    /// Full argv executed inside the builder container.
    pub fn command(&self) -> Vec<String> {
        let mut argv = self.shell.clone();
        argv.push(self.script.clone());
        argv
    }
}

/// Result store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    #[serde(default = "default_store_image")]
    pub image: String,

    #[serde(default = "default_store_url")]
    pub url: String,

    /// Prefix of the per-node result keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Delay after starting the store container before it is used
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
}

fn default_store_image() -> String {
    "redis:latest".to_string()
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_key_prefix() -> String {
    "result".to_string()
}

const fn default_warmup_ms() -> u64 {
    2000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            image: default_store_image(),
            url: default_store_url(),
            key_prefix: default_key_prefix(),
            warmup_ms: default_warmup_ms(),
        }
    }
}

/// Result polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_lookup_workers")]
    pub lookup_workers: usize,
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    480
}

const fn default_lookup_workers() -> usize {
    16
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            lookup_workers: default_lookup_workers(),
        }
    }
}

/// Artifact output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Directory artifacts are written to
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,

    /// Skip sweep points whose artifact already exists
    #[serde(default)]
    pub skip_existing: bool,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            skip_existing: false,
        }
    }
}

/// Container runtime client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Container runtime executable
    #[serde(default = "default_docker_path")]
    pub docker_path: String,

    /// Stop timeout for the builder and store containers
    #[serde(default = "default_singleton_stop_timeout_secs")]
    pub singleton_stop_timeout_secs: u64,
}

fn default_docker_path() -> String {
    "docker".to_string()
}

const fn default_singleton_stop_timeout_secs() -> u64 {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_path: default_docker_path(),
            singleton_stop_timeout_secs: default_singleton_stop_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file logs: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
