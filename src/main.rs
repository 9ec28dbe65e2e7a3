use std::path::PathBuf;

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use tapec::{
    Program,
    vm::{
        DEFAULT_TAPE_LENGTH, Machine,
        pretty_print::{pretty_print_program, pretty_print_tape},
    },
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// File containing tape-machine instructions (bytes outside the
    /// alphabet are treated as comments)
    program: PathBuf,

    /// Number of cells on the tape ring
    #[arg(long, default_value_t = DEFAULT_TAPE_LENGTH)]
    tape_length: usize,

    /// Pretty-print the instruction stream before running it
    #[arg(long)]
    show_code: bool,

    /// Dump the first N cells after the run
    #[arg(long, value_name = "N")]
    dump_cells: Option<usize>,
}

fn main() {
    let args = Args::parse();

    if !args.program.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Program file '{}' does not exist!", args.program.display()),
            )
            .exit()
    }

    if args.tape_length == 0 {
        Args::command()
            .error(ErrorKind::InvalidValue, "Tape length must be at least 1!")
            .exit()
    }

    let text = std::fs::read_to_string(&args.program)
        .expect("Failed to read program file (or invalid UTF-8)");
    let program = Program::from_text(&text);

    if args.show_code {
        pretty_print_program(&program);
    }

    let mut machine = Machine::new(args.tape_length);

    if let Err(error) = machine.execute(&program) {
        eprintln!("{} {error}", "error:".bright_red().bold());
        std::process::exit(1);
    }

    if let Some(count) = args.dump_cells {
        pretty_print_tape(machine.tape(), machine.pointer(), count);
    }
}
