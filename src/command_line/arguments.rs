use {
    clap::{Parser, Subcommand},
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,

    /// Raise the log verbosity (may be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enumerate the prime implicant classes of the negated reachable-state
    /// set and print one representative cube per class
    Enumerate {
        /// The protocol specification file
        protocol: PathBuf,

        /// The PLA file holding the reachable-state cubes
        cubes: PathBuf,

        /// Verify that the cube set is closed under the domain symmetries
        #[arg(long, action)]
        check_symmetry: bool,
    },

    /// Select a minimum-cost set of prime implicant classes that rules out
    /// the same states as the full class set
    Minimize {
        /// The protocol specification file
        protocol: PathBuf,

        /// The PLA file holding the reachable-state cubes
        cubes: PathBuf,

        /// Find every minimum-cost cover instead of the first one
        #[arg(long, action)]
        all_solutions: bool,

        /// Compare the model set of each emitted cover against the full
        /// cover table
        #[arg(long, action)]
        check_solution: bool,

        /// Prefer classes built purely from constant atoms during decisions
        #[arg(long, action)]
        prefer_consts: bool,

        /// Verify that the cube set is closed under the domain symmetries
        #[arg(long, action)]
        check_symmetry: bool,

        /// A quantified-cost file whose records override the cost of
        /// matching classes
        #[arg(long)]
        pi_weights: Option<PathBuf>,

        /// Write the cover-table CNF to this file in DIMACS syntax
        #[arg(long)]
        print_dimacs: Option<PathBuf>,

        /// Write a per-class summary to this file
        #[arg(long)]
        print_classinfo: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::Arguments;

    #[test]
    fn verify() {
        use clap::CommandFactory as _;
        Arguments::command().debug_assert()
    }
}
