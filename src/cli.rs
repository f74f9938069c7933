//! Command-line arguments and interactive commands for prayertimes

/// Parse command line arguments
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub once: bool,
    pub refresh: bool,
    pub validate: bool,
    pub help: bool,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse from an explicit argv; element 0 is the program name. Unknown
/// arguments are ignored.
pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--once" => result.once = true,
            "--refresh" => result.refresh = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            _ => {}
        }
    }

    result
}

pub fn print_help() {
    println!("prayertimes - daily prayer times with a next-prayer countdown\n");
    println!("USAGE:");
    println!("    prayertimes [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once          Print the board once and exit");
    println!("    --refresh       Ignore the cached month on the first load");
    println!("    --validate      Validate configuration and exit");
    println!("    --help, -h      Show this help message\n");
    println!("COMMANDS (while running, followed by Enter):");
    println!("    p   previous day");
    println!("    n   next day");
    println!("    t   back to today");
    println!("    r   retry / refresh from the provider");
    println!("    q   quit\n");
    println!("ENVIRONMENT:");
    println!("    See .env.example for configuration variables");
}

/// A line typed on stdin while the board is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PreviousDay,
    NextDay,
    Today,
    Refresh,
    Quit,
}

impl Command {
    /// Case-insensitive; accepts the single letter or the full word
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "prev" | "previous" => Some(Command::PreviousDay),
            "n" | "next" => Some(Command::NextDay),
            "t" | "today" => Some(Command::Today),
            "r" | "retry" | "refresh" => Some(Command::Refresh),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}
