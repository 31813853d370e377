use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

const fn about_text() -> &'static str {
    "coilbridge - bridge RTU-style valve and pump controllers between MQTT and an HTTP status/control API."
}

#[derive(Parser, Debug)]
#[command(name = "coilbridge", author, version, about = about_text(), long_about = None)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -q for warnings only, -v for debug, -vv for trace.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Path to the YAML configuration file.
    /// Falls back to "config.yml" in the working directory, then to built-in
    /// defaults. Environment variables (MQTT_URL, MQTT_USER, MQTT_PASS,
    /// HTTP_LISTEN, API_TOKEN, TLS_CERT, TLS_KEY) override either.
    #[arg(short, long, verbatim_doc_comment)]
    pub config: Option<PathBuf>,
}
