use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("marginalia")
        .version("1.0.0")
        .author("Marginalia Contributors")
        .about("Highlight key sentences and terms in web articles")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file for the annotated page (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--api_key <KEY> "API key for the model service").value_name("KEY"))
        .arg(clap::arg!(--endpoint <URL> "Chat-completions endpoint URL").value_name("URL"))
        .arg(clap::arg!(--model <MODEL> "Model identifier").value_name("MODEL"))
        .arg(clap::arg!(--timeout <SECS> "Model request timeout in seconds").default_value("120"))
        .arg(clap::arg!(--fetch_timeout <SECS> "HTTP timeout for fetching the page").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for page fetches").value_name("UA"))
        .arg(clap::arg!(--report "Print the pass report as JSON to stderr"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "marginalia", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
