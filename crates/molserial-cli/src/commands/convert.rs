use crate::cli::ConvertArgs;
use crate::error::{CliError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use molserial::chem::kit::StdToolkit;
use molserial::pipeline::reader::{MolReader, ParseErrorPolicy, ReaderOptions};
use molserial::pipeline::writer::{MolWriter, WriterOptions};
use std::time::Duration;
use tracing::info;

const SPINNER_TICK_MS: u64 = 80;

pub fn run(args: ConvertArgs) -> Result<()> {
    if args.input == args.output {
        return Err(CliError::Argument(
            "input and output paths must differ".to_string(),
        ));
    }

    let reader_options = ReaderOptions {
        remove_hydrogens: !args.keep_hydrogens,
        remove_salts: !args.keep_salts,
        format: args.in_format,
        compression: None,
        on_parse_error: if args.skip_bad_records {
            ParseErrorPolicy::Skip
        } else {
            ParseErrorPolicy::Fail
        },
    };
    let writer_options = WriterOptions {
        stereo: !args.no_stereo,
        format: args.out_format,
        compression: None,
    };

    let mut reader = MolReader::with_options(StdToolkit::new(), reader_options);
    reader.open(&args.input)?;
    let mut writer = MolWriter::with_options(StdToolkit::new(), writer_options);
    writer.open(&args.output)?;

    let pb = ProgressBar::new_spinner().with_style(spinner_style());
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));

    let mut written = 0usize;
    for mol in reader.mols() {
        let mol = mol?;
        writer.write_mol(&mol)?;
        written += 1;
        pb.set_message(format!("{} molecules", written));
    }
    writer.close()?;
    pb.finish_and_clear();

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        written,
        "conversion finished"
    );
    println!(
        "Wrote {} molecules to {}",
        written,
        args.output.display()
    );
    Ok(())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} Converting... {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
