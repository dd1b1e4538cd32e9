mod cli;

use crank::expand::expand_scalar;
use crank::iteration::PromiseIterator;
use crank::store::MemoryStore;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CRANK_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Iterate(iterate_cli) => iterate(iterate_cli),
        cli::Command::Expand(expand_cli) => expand(expand_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn iterate(cli: cli::IterateCommand) -> anyhow::Result<()> {
    let mut store = load(&cli.input)?;

    let mut text = cli.promise;
    let mut iterator = PromiseIterator::new();
    iterator.prepare(&mut text, &store);

    let mut combinations = vec![];
    while iterator.next_combination(&mut store) {
        combinations.push(expand_scalar(&store, &text));
    }

    tracing::info!(combinations = iterator.combinations_yielded(), "done");
    output(&cli.output, &combinations)?;
    Ok(())
}

pub fn expand(cli: cli::ExpandCommand) -> anyhow::Result<()> {
    let store = load(&cli.input)?;
    println!("{}", expand_scalar(&store, &cli.text));
    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<MemoryStore> {
    let mut store = MemoryStore::default();

    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&stdin)?;
        for (name, value) in document {
            store.insert_json(name, value)?;
        }
        return Ok(store);
    }

    if input.workdir {
        store.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        store.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        store.load_directory(dir_path)?;
    }

    Ok(store)
}

fn output(output: &cli::OutputArgs, combinations: &[String]) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), combinations)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), combinations)?,
    };

    Ok(())
}

/// (crank-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    match cli.command {
        cli::DevSubCommand::Wheels { input, promise } => {
            let store = load(&input)?;

            let mut text = promise;
            let mut iterator = PromiseIterator::new();
            iterator.prepare(&mut text, &store);

            println!("prepared text: {text}");
            println!("{iterator:#?}");
        }
    }

    Ok(())
}
