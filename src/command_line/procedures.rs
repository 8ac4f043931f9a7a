use {
    crate::{
        command_line::{Arguments, Command},
        cube::{CubeFactory, PiClass},
        enumerating::enumerate_classes,
        formatting::{ClassInfo, Dimacs},
        minimizing::{Minimizer, SearchOptions},
        parsing::{pla::TableParser, protocol::SpecificationParser, weights, PestParser as _},
        protocol::{Signature, Universe},
        symmetry::SymmetryTable,
    },
    anyhow::{Context, Result},
    clap::Parser as _,
    itertools::Itertools,
    std::{fs, path::Path},
    tracing_subscriber::EnvFilter,
};

pub fn main() -> Result<()> {
    let arguments = Arguments::parse();

    let default_level = match arguments.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match arguments.command {
        Command::Enumerate {
            protocol,
            cubes,
            check_symmetry,
        } => {
            let prepared = prepare(&protocol, &cubes, check_symmetry)?;

            println!(
                "// PIC list of {}",
                cubes
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| cubes.display().to_string())
            );
            println!(
                "// PLA Header: {}",
                prepared.universe.atoms.iter().join(" ")
            );
            for class in &prepared.classes {
                println!("{}", class.representative());
            }

            Ok(())
        }

        Command::Minimize {
            protocol,
            cubes,
            all_solutions,
            check_solution,
            prefer_consts,
            check_symmetry,
            pi_weights,
            print_dimacs,
            print_classinfo,
        } => {
            let mut prepared = prepare(&protocol, &cubes, check_symmetry)?;

            if let Some(path) = pi_weights {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("could not read file `{}`", path.display()))?;
                let records = weights::parse(&content)
                    .with_context(|| format!("could not parse file `{}`", path.display()))?;
                apply_weights(&mut prepared.classes, &records);
            }

            if let Some(path) = print_dimacs {
                let dimacs = Dimacs {
                    classes: &prepared.classes,
                    max_input_var: prepared.universe.atoms.len() as i32,
                };
                fs::write(&path, dimacs.to_string())
                    .with_context(|| format!("could not write file `{}`", path.display()))?;
            }

            if let Some(path) = print_classinfo {
                let info = ClassInfo {
                    classes: &prepared.classes,
                };
                fs::write(&path, info.to_string())
                    .with_context(|| format!("could not write file `{}`", path.display()))?;
            }

            let options = SearchOptions {
                all_solutions,
                check_solution,
                prefer_consts,
            };
            let minimizer = Minimizer::new(
                prepared.classes,
                prepared.universe.atoms.len() as i32,
                options,
            )?;
            let outcome = minimizer.solve()?;

            if outcome.all_root_essential {
                println!("All prime implicant classes are root-essential, no search performed.");
            }
            println!(
                "A solution: [{}] (from {} found solutions)",
                outcome.solutions[0].iter().join(", "),
                outcome.solutions.len()
            );
            println!("Solution cost: {}", outcome.cost);
            if all_solutions && outcome.solutions.len() > 1 {
                println!("All optimal solutions:");
                for solution in &outcome.solutions {
                    println!("[{}]", solution.iter().join(", "));
                }
            }
            tracing::info!(sat_calls = outcome.sat_calls, "cover search finished");

            if outcome.solutions.len() == 1 {
                for id in &outcome.solutions[0] {
                    let form = &outcome.classes[id].quantified_form;
                    if form.is_empty() {
                        break;
                    }
                    println!("invariant [pi{id}] {form}");
                }
            }

            Ok(())
        }
    }
}

struct Preparation {
    universe: Universe,
    classes: Vec<PiClass>,
}

/// The shared front half of both subcommands: parse and validate the two
/// input files, build the symmetry table, and enumerate the prime implicant
/// classes.
fn prepare(protocol: &Path, cubes: &Path, check_symmetry: bool) -> Result<Preparation> {
    let content = fs::read_to_string(protocol)
        .with_context(|| format!("could not read file `{}`", protocol.display()))?;
    let declarations = SpecificationParser::parse(&content)
        .with_context(|| format!("could not parse file `{}`", protocol.display()))?;
    let signature = Signature::from_declarations(declarations)
        .with_context(|| format!("could not interpret file `{}`", protocol.display()))?;

    let content = fs::read_to_string(cubes)
        .with_context(|| format!("could not read file `{}`", cubes.display()))?;
    let input = TableParser::parse(&content)
        .with_context(|| format!("could not parse file `{}`", cubes.display()))?;
    let (universe, rows) = input
        .validate(signature)
        .with_context(|| format!("could not validate file `{}`", cubes.display()))?;

    tracing::info!(
        atoms = universe.atoms.len(),
        cubes = rows.len(),
        "collected input"
    );

    let symmetries = SymmetryTable::build(&universe)?;
    if check_symmetry {
        symmetries.verify_closure(&rows)?;
        tracing::info!("the cube set is closed under the domain symmetries");
    }

    let mut factory = CubeFactory::new(universe.atoms.len() as i32 + 1);
    let classes = enumerate_classes(&symmetries, &universe.atoms, &rows, &mut factory)?;

    Ok(Preparation { universe, classes })
}

fn apply_weights(classes: &mut [PiClass], records: &indexmap::IndexMap<String, weights::Record>) {
    for class in classes {
        let cube = class.representative().to_string();
        if let Some(record) = records.get(&cube) {
            class.quantified_form = record.quantified_form.clone();
            class.qcost = record.cost;
            tracing::debug!(
                class = class.id,
                cube = %cube,
                qcost = record.cost,
                "applied quantified cost"
            );
        }
    }
}
