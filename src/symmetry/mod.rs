use {
    crate::{
        cube::Ternary,
        protocol::{Atom, Universe},
    },
    indexmap::{IndexMap, IndexSet},
    itertools::Itertools,
    std::collections::{HashMap, HashSet},
    thiserror::Error,
};

/// Sort names that denote a derived quorum sort and the base sorts their
/// elements are majority subsets of.
const QUORUM_SORTS: [&str; 3] = ["quorum", "nset", "nodeset"];
const SUPERSET_SORTS: [&str; 2] = ["node", "acceptor"];

#[derive(Error, Debug)]
pub enum Error {
    #[error("at most one quorum sort is supported")]
    MultipleQuorumSorts,
    #[error("cannot identify the superset sort of quorum sort `{0}`")]
    MissingSuperset(String),
    #[error("quorum sort `{sort}` has {found} elements but {expected} majority subsets exist")]
    QuorumCardinality {
        sort: String,
        expected: usize,
        found: usize,
    },
    #[error("the permuted atom `{0}` does not correspond to any input atom")]
    UnknownPermutedAtom(String),
    #[error("the symmetric variant `{variant}` of cube `{cube}` is missing from the cube set")]
    ClosureViolation { cube: String, variant: String },
}

/// The bijection between a quorum sort's elements and the majority subsets
/// of its superset sort. Majorities are enumerated in lexicographic order
/// and zipped against the sorted quorum element names.
#[derive(Debug)]
struct Quorums {
    sort: String,
    superset: String,
    names: Vec<String>,
    majorities: IndexMap<Vec<String>, usize>,
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let mut result = 1usize;
    for i in 0..k {
        result = result * (n - i) / (i + 1);
    }
    result
}

/// Detect a quorum sort among the domains. On success the quorum sort is
/// removed from `domains` so that it is not permuted independently.
fn detect_quorums(domains: &mut IndexMap<String, Vec<String>>) -> Result<Option<Quorums>, Error> {
    let superset = SUPERSET_SORTS
        .iter()
        .filter(|name| domains.contains_key(**name))
        .last()
        .map(|name| name.to_string());

    let mut quorums = None;
    for name in QUORUM_SORTS {
        if !domains.contains_key(name) {
            continue;
        }
        if quorums.is_some() {
            return Err(Error::MultipleQuorumSorts);
        }
        let superset = superset
            .clone()
            .ok_or_else(|| Error::MissingSuperset(name.to_string()))?;

        let superset_elements = domains[&superset].clone();
        let majority_size = superset_elements.len() / 2 + 1;
        let expected = binomial(superset_elements.len(), majority_size);

        let names = domains
            .shift_remove(name)
            .expect("the quorum sort was just found");
        if names.len() != expected {
            return Err(Error::QuorumCardinality {
                sort: name.to_string(),
                expected,
                found: names.len(),
            });
        }

        let majorities = superset_elements
            .iter()
            .cloned()
            .combinations(majority_size)
            .zip(0..)
            .collect();

        quorums = Some(Quorums {
            sort: name.to_string(),
            superset,
            names,
            majorities,
        });
    }

    Ok(quorums)
}

/// The permutation table over atom positions induced by all permutations of
/// each sort's ground elements. Row 0 is always the identity, so the first
/// member of every orbit is the cube the orbit was expanded from.
#[derive(Debug)]
pub struct SymmetryTable {
    rows: Vec<Vec<usize>>,
}

impl SymmetryTable {
    pub fn build(universe: &Universe) -> Result<Self, Error> {
        // Domains sorted lexicographically; the element index within its
        // sorted domain is what the permutations act on.
        let mut domains: IndexMap<String, Vec<String>> = universe
            .elements
            .iter()
            .map(|(sort, elements)| (sort.clone(), elements.iter().cloned().collect()))
            .collect();
        let quorums = detect_quorums(&mut domains)?;

        let atom_positions: HashMap<&Atom, usize> = universe
            .atoms
            .iter()
            .enumerate()
            .map(|(position, atom)| (atom, position))
            .collect();
        let element_positions: Vec<HashMap<&str, usize>> = domains
            .values()
            .map(|elements| {
                elements
                    .iter()
                    .enumerate()
                    .map(|(position, element)| (element.as_str(), position))
                    .collect()
            })
            .collect();
        let superset_index = quorums
            .as_ref()
            .map(|q| {
                domains
                    .get_index_of(&q.superset)
                    .expect("the superset sort is an ordinary domain")
            })
            .unwrap_or_default();

        // The direct product of the symmetric groups on each domain. With no
        // domains at all (only constant atoms) the table is the identity.
        let combinations: Vec<Vec<Vec<usize>>> = if domains.is_empty() {
            vec![vec![]]
        } else {
            domains
                .values()
                .map(|elements| (0..elements.len()).permutations(elements.len()))
                .multi_cartesian_product()
                .collect()
        };

        let mut rows = Vec::with_capacity(combinations.len());
        for permutation in combinations {
            // Where each quorum element goes: permute its majority subset
            // through the superset permutation and look the result up again.
            let permuted_quorums: Vec<usize> = match &quorums {
                Some(q) => q
                    .majorities
                    .keys()
                    .map(|majority| {
                        let mut permuted: Vec<String> = majority
                            .iter()
                            .map(|element| {
                                let position = element_positions[superset_index][element.as_str()];
                                domains[superset_index][permutation[superset_index][position]]
                                    .clone()
                            })
                            .collect();
                        permuted.sort();
                        q.majorities[&permuted]
                    })
                    .collect(),
                None => vec![],
            };

            let mut row = Vec::with_capacity(universe.atoms.len());
            for atom in &universe.atoms {
                let argument_sorts = &universe.signature.predicates[&atom.predicate];
                let mut permuted_arguments = Vec::with_capacity(atom.arguments.len());
                for (argument, sort) in atom.arguments.iter().zip(argument_sorts) {
                    let permuted = match &quorums {
                        Some(q) if *sort == q.sort => {
                            let index = q
                                .names
                                .iter()
                                .position(|name| name == argument)
                                .expect("quorum elements come from the quorum domain");
                            q.names[permuted_quorums[index]].clone()
                        }
                        _ => {
                            let sort_index = domains
                                .get_index_of(sort)
                                .expect("every argument sort has a collected domain");
                            let position = element_positions[sort_index][argument.as_str()];
                            domains[sort_index][permutation[sort_index][position]].clone()
                        }
                    };
                    permuted_arguments.push(permuted);
                }

                let target = Atom {
                    predicate: atom.predicate.clone(),
                    arguments: permuted_arguments,
                };
                let position = atom_positions
                    .get(&target)
                    .ok_or_else(|| Error::UnknownPermutedAtom(target.to_string()))?;
                row.push(*position);
            }
            rows.push(row);
        }

        tracing::debug!(rows = rows.len(), "built symmetry permutation table");
        Ok(SymmetryTable { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every cube obtainable from `values` by a symmetry action, first
    /// occurrence first. Row 0 being the identity, `values` itself leads.
    pub fn orbit(&self, values: &[Ternary]) -> Vec<Vec<Ternary>> {
        let mut variants = IndexSet::new();
        for row in &self.rows {
            let variant: Vec<Ternary> = row.iter().map(|&position| values[position]).collect();
            variants.insert(variant);
        }
        variants.into_iter().collect()
    }

    /// Verify that a cube set is closed under the domain symmetries: every
    /// orbit member of every concrete expansion of every cube must itself be
    /// a concrete expansion of some cube in the set.
    pub fn verify_closure(&self, cubes: &[Vec<Ternary>]) -> Result<(), Error> {
        let mut concrete = HashSet::new();
        for cube in cubes {
            for expansion in expansions(cube) {
                concrete.insert(expansion);
            }
        }

        for cube in cubes {
            for expansion in expansions(cube) {
                for variant in self.orbit(&expansion) {
                    if !concrete.contains(&variant) {
                        return Err(Error::ClosureViolation {
                            cube: cube.iter().map(Ternary::to_string).collect(),
                            variant: variant.iter().map(Ternary::to_string).collect(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// All concrete cubes a ternary cube stands for, with don't-cares expanded
/// both ways.
fn expansions(values: &[Ternary]) -> impl Iterator<Item = Vec<Ternary>> + '_ {
    values
        .iter()
        .map(|value| match value {
            Ternary::DontCare => vec![Ternary::False, Ternary::True],
            concrete => vec![*concrete],
        })
        .multi_cartesian_product()
}

#[cfg(test)]
mod tests {
    use {
        super::{binomial, Error, SymmetryTable},
        crate::{
            cube::values_from_str,
            protocol::{Declaration, InputCubes, CubeRow, HeaderAtom, Parameter, Signature, Universe},
        },
    };

    fn universe(
        declarations: Vec<Declaration>,
        header: Vec<(&str, Vec<&str>)>,
        rows: Vec<&str>,
    ) -> (Universe, Vec<Vec<crate::cube::Ternary>>) {
        let signature = Signature::from_declarations(declarations).unwrap();
        let input = InputCubes {
            declared_inputs: Some(header.len()),
            declared_outputs: Some(1),
            header: header
                .into_iter()
                .map(|(name, arguments)| HeaderAtom {
                    name: name.into(),
                    arguments: arguments.into_iter().map(String::from).collect(),
                })
                .collect(),
            output_names: vec!["out".into()],
            rows: rows
                .into_iter()
                .map(|values| CubeRow {
                    values: values_from_str(values).unwrap(),
                    output: '1',
                })
                .collect(),
        };
        input.validate(signature).unwrap()
    }

    fn leq_universe() -> Universe {
        let (universe, _) = universe(
            vec![
                Declaration::Sort { name: "node".into() },
                Declaration::Relation {
                    name: "leq".into(),
                    parameters: vec![
                        Parameter {
                            name: "X".into(),
                            sort: "node".into(),
                        },
                        Parameter {
                            name: "Y".into(),
                            sort: "node".into(),
                        },
                    ],
                },
            ],
            vec![
                ("leq", vec!["n1", "n1"]),
                ("leq", vec!["n1", "n2"]),
                ("leq", vec!["n2", "n1"]),
                ("leq", vec!["n2", "n2"]),
            ],
            vec!["1-1-"],
        );
        universe
    }

    #[test]
    fn binomial_coefficients() {
        assert_eq!(binomial(3, 2), 3);
        assert_eq!(binomial(5, 3), 10);
        assert_eq!(binomial(4, 0), 1);
        assert_eq!(binomial(2, 3), 0);
    }

    #[test]
    fn two_node_relation_orbit() {
        let table = SymmetryTable::build(&leq_universe()).unwrap();
        assert_eq!(table.len(), 2);

        let orbit = table.orbit(&values_from_str("1-1-").unwrap());
        assert_eq!(
            orbit,
            vec![
                values_from_str("1-1-").unwrap(),
                values_from_str("-1-1").unwrap(),
            ]
        );
    }

    #[test]
    fn constant_only_universe_has_identity_table() {
        let (universe, _) = universe(
            vec![
                Declaration::Relation {
                    name: "p".into(),
                    parameters: vec![],
                },
                Declaration::Relation {
                    name: "q".into(),
                    parameters: vec![],
                },
            ],
            vec![("p", vec![]), ("q", vec![])],
            vec!["01"],
        );

        let table = SymmetryTable::build(&universe).unwrap();
        assert_eq!(table.len(), 1);
        let cube = values_from_str("01").unwrap();
        assert_eq!(table.orbit(&cube), vec![cube.clone()]);
    }

    fn quorum_declarations() -> Vec<Declaration> {
        vec![
            Declaration::Sort { name: "node".into() },
            Declaration::Sort { name: "quorum".into() },
            Declaration::Relation {
                name: "voted".into(),
                parameters: vec![
                    Parameter {
                        name: "N".into(),
                        sort: "node".into(),
                    },
                    Parameter {
                        name: "Q".into(),
                        sort: "quorum".into(),
                    },
                ],
            },
        ]
    }

    #[test]
    fn quorum_sort_is_remapped_through_the_superset() {
        // Three nodes, majorities of size two; quorum names sort as
        // q_ab < q_ac < q_bc and bind to {a,b} < {a,c} < {b,c}.
        let header = vec![
            ("voted", vec!["a", "q_ab"]),
            ("voted", vec!["a", "q_ac"]),
            ("voted", vec!["a", "q_bc"]),
            ("voted", vec!["b", "q_ab"]),
            ("voted", vec!["b", "q_ac"]),
            ("voted", vec!["b", "q_bc"]),
            ("voted", vec!["c", "q_ab"]),
            ("voted", vec!["c", "q_ac"]),
            ("voted", vec!["c", "q_bc"]),
        ];
        let (universe, cubes) = universe(quorum_declarations(), header, vec!["100000000"]);

        let table = SymmetryTable::build(&universe).unwrap();
        // 3! node permutations; the quorum sort contributes none of its own.
        assert_eq!(table.len(), 6);

        // voted(a, q_ab) maps onto voted(x, q_xy) for every node pair.
        let orbit = table.orbit(&cubes[0]);
        assert_eq!(orbit.len(), 6);
        for variant in &orbit {
            let set = variant
                .iter()
                .filter(|v| matches!(v, crate::cube::Ternary::True))
                .count();
            assert_eq!(set, 1);
        }
        assert!(orbit.contains(&values_from_str("000100000").unwrap())); // voted(b, q_ab)
        assert!(orbit.contains(&values_from_str("000000010").unwrap())); // voted(c, q_ac)
    }

    #[test]
    fn wrong_quorum_cardinality_is_fatal() {
        let header = vec![
            ("voted", vec!["a", "q_ab"]),
            ("voted", vec!["b", "q_ab"]),
            ("voted", vec!["c", "q_ab"]),
        ];
        let (universe, _) = universe(quorum_declarations(), header, vec!["100"]);

        assert!(matches!(
            SymmetryTable::build(&universe),
            Err(Error::QuorumCardinality { expected: 3, found: 1, .. })
        ));
    }

    #[test]
    fn quorum_without_superset_is_fatal() {
        let declarations = vec![
            Declaration::Sort { name: "quorum".into() },
            Declaration::Relation {
                name: "chosen".into(),
                parameters: vec![Parameter {
                    name: "Q".into(),
                    sort: "quorum".into(),
                }],
            },
        ];
        let (universe, _) = universe(declarations, vec![("chosen", vec!["q1"])], vec!["1"]);

        assert!(matches!(
            SymmetryTable::build(&universe),
            Err(Error::MissingSuperset(_))
        ));
    }

    #[test]
    fn closure_validation() {
        let table = SymmetryTable::build(&leq_universe()).unwrap();

        let closed = vec![
            values_from_str("1-1-").unwrap(),
            values_from_str("-1-1").unwrap(),
        ];
        assert!(table.verify_closure(&closed).is_ok());

        let open = vec![values_from_str("1000").unwrap()];
        assert!(matches!(
            table.verify_closure(&open),
            Err(Error::ClosureViolation { .. })
        ));
    }
}
