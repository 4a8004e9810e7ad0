use clap::arg;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("vigil")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("vigil")
        .styles(CLAP_STYLING)
        .about("Recursively audits a domain's pages for unwanted terms and links")
        .arg(
            arg!(-d --"base-domain" <URL>)
                .required(true)
                .help("Base domain (used to start crawling and to complete relative paths)"),
        )
        .arg(
            arg!(-t --"terms" <TERM>)
                .required(true)
                .num_args(1..)
                .help("Terms to look up. A threshold can be set with \"term:threshold\""),
        )
        .arg(
            arg!(-l --"link-lookup")
                .required(false)
                .help("Consider only link targets when looking for matches"),
        )
        .arg(
            arg!(-v --"verbosity-level" <LEVEL>)
                .required(false)
                .value_parser(clap::value_parser!(u8).range(1..=3))
                .default_value("1")
                .help("Verbosity level (1 = min verbosity, 3 = max verbosity)"),
        )
        .arg(
            arg!(-w --"workers" <COUNT>)
                .required(false)
                .value_parser(clap::value_parser!(usize))
                .default_value("1")
                .help("Concurrent fetch workers (1 keeps deterministic depth-first order)"),
        )
        .arg(
            arg!(-m --"max-pages" <COUNT>)
                .required(false)
                .value_parser(clap::value_parser!(usize))
                .help("Stop after this many pages have been claimed for fetching"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .value_parser(clap::value_parser!(u64))
                .help("Overall crawl budget; the partial report is still produced"),
        )
        .arg(
            arg!(--"fetch-timeout" <SECONDS>)
                .required(false)
                .value_parser(clap::value_parser!(u64))
                .default_value("10")
                .help("Per-request timeout"),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Report output format"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .help("Write the report to a file instead of stdout"),
        )
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
}
