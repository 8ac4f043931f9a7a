use {
    crate::cube::Ternary,
    indexmap::{IndexMap, IndexSet},
    std::{
        collections::BTreeSet,
        fmt::{self, Display, Formatter},
        ops::Range,
    },
    thiserror::Error,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("sort `{0}` is declared more than once")]
    DuplicateSort(String),
    #[error("predicate `{0}` is declared more than once")]
    DuplicatePredicate(String),
    #[error("undefined predicate: `{0}`")]
    UndefinedPredicate(String),
    #[error("predicate `{predicate}` expects {expected} arguments but {found} were given")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },
    #[error("the atom `{0}` occurs more than once in the input header")]
    DuplicateAtom(String),
    #[error("the number of input variables is {declared} but {found} names were given")]
    InputCountMismatch { declared: usize, found: usize },
    #[error("the number of input variables is undeclared (is the `.i` line missing?)")]
    MissingInputCount,
    #[error("the number of output variables is expected to be one")]
    OutputCountNotOne,
    #[error("exactly one output variable name is expected (is the `.ob` line missing?)")]
    MissingOutputName,
    #[error("member atoms do not form a contiguous range of input positions")]
    ScatteredMemberRange,
    #[error("cube `{cube}` has length {found} but length {expected} is expected")]
    CubeLengthMismatch {
        cube: String,
        expected: usize,
        found: usize,
    },
    #[error("cube `{cube}` maps to `{output}` but every cube is expected to map to 1")]
    UnexpectedOutput { cube: String, output: char },
}

/// A ground Boolean term `predicate(arguments)` over the protocol signature.
/// The position of an atom in the input header defines its bit position in
/// every cube.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Atom {
    pub predicate: String,
    pub arguments: Vec<String>,
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{argument}")?;
        }
        write!(f, ")")
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub sort: String,
}

/// A single declaration of the protocol specification. Everything else in
/// the specification file is ignored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Declaration {
    Sort {
        name: String,
    },
    Relation {
        name: String,
        parameters: Vec<Parameter>,
    },
    Function {
        name: String,
        parameters: Vec<Parameter>,
        returns: String,
    },
    Individual {
        name: String,
        sort: String,
    },
}

/// The declared sorts and predicates of a protocol. Functions with a
/// non-Boolean return sort are encoded as predicates with the return sort
/// appended to the argument sorts; individuals become zero- or one-argument
/// predicates. Sort and predicate names are case-folded.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub sorts: Vec<String>,
    pub predicates: IndexMap<String, Vec<String>>,
}

impl Signature {
    pub fn from_declarations(
        declarations: impl IntoIterator<Item = Declaration>,
    ) -> Result<Self, Error> {
        let mut signature = Signature::default();

        for declaration in declarations {
            match declaration {
                Declaration::Sort { name } => signature.add_sort(&name)?,
                Declaration::Relation { name, parameters } => {
                    let sorts = parameters.into_iter().map(|p| p.sort).collect();
                    signature.add_predicate(&name, sorts)?;
                }
                Declaration::Function {
                    name,
                    parameters,
                    returns,
                } => {
                    let mut sorts: Vec<String> =
                        parameters.into_iter().map(|p| p.sort).collect();
                    if returns.to_lowercase() != "bool" {
                        sorts.push(returns);
                    }
                    signature.add_predicate(&name, sorts)?;
                }
                Declaration::Individual { name, sort } => {
                    let sorts = if sort.to_lowercase() == "bool" {
                        vec![]
                    } else {
                        vec![sort]
                    };
                    signature.add_predicate(&name, sorts)?;
                }
            }
        }

        Ok(signature)
    }

    pub fn add_sort(&mut self, name: &str) -> Result<(), Error> {
        let name = name.to_lowercase();
        if self.sorts.contains(&name) {
            return Err(Error::DuplicateSort(name));
        }
        self.sorts.push(name);
        Ok(())
    }

    pub fn add_predicate(&mut self, name: &str, argument_sorts: Vec<String>) -> Result<(), Error> {
        let name = name.to_lowercase();
        if self.predicates.contains_key(&name) {
            return Err(Error::DuplicatePredicate(name));
        }
        let argument_sorts = argument_sorts
            .into_iter()
            .map(|sort| sort.to_lowercase())
            .collect();
        self.predicates.insert(name, argument_sorts);
        Ok(())
    }

    /// Resolve the predicate of a header atom. An undeclared name that ends
    /// in `.p` for some declared predicate `p` re-binds the declaration to
    /// the longer name (the header is authoritative about qualified names);
    /// the re-binding happens at most once per declaration.
    fn resolve_predicate(&mut self, name: &str) -> Result<String, Error> {
        if self.predicates.contains_key(name) {
            return Ok(name.to_string());
        }

        let declared = self
            .predicates
            .keys()
            .find(|short| name.ends_with(&format!(".{short}")))
            .cloned();

        match declared {
            Some(short) => {
                let sorts = self
                    .predicates
                    .shift_remove(&short)
                    .expect("the declaration was just found");
                self.predicates.insert(name.to_string(), sorts);
                Ok(name.to_string())
            }
            None => Err(Error::UndefinedPredicate(name.to_string())),
        }
    }
}

/// An atom of the `.ilb` header line, before validation against the
/// signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderAtom {
    pub name: String,
    pub arguments: Vec<String>,
}

impl HeaderAtom {
    /// Header names carry artifacts of the tool that produced the PLA file:
    /// a `__` prefix and a `:`-separated suffix are dropped.
    fn normalized_name(&self) -> &str {
        let name = self.name.strip_prefix("__").unwrap_or(&self.name);
        name.split(':').next().unwrap_or(name)
    }
}

/// A raw cube row of the PLA file: the ternary values and the output digit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CubeRow {
    pub values: Vec<Ternary>,
    pub output: char,
}

/// The parsed but unvalidated content of a PLA file.
#[derive(Clone, Debug, Default)]
pub struct InputCubes {
    pub declared_inputs: Option<usize>,
    pub declared_outputs: Option<usize>,
    pub header: Vec<HeaderAtom>,
    pub output_names: Vec<String>,
    pub rows: Vec<CubeRow>,
}

impl InputCubes {
    /// Validate the file against a signature and produce the ground-atom
    /// universe together with the (possibly member-stripped) cube vectors.
    pub fn validate(self, signature: Signature) -> Result<(Universe, Vec<Vec<Ternary>>), Error> {
        let declared_inputs = self.declared_inputs.ok_or(Error::MissingInputCount)?;
        if declared_inputs != self.header.len() {
            return Err(Error::InputCountMismatch {
                declared: declared_inputs,
                found: self.header.len(),
            });
        }
        if self.declared_outputs != Some(1) {
            return Err(Error::OutputCountNotOne);
        }
        if self.output_names.len() != 1 {
            return Err(Error::MissingOutputName);
        }

        let (universe, members) = Universe::collect(signature, &self.header)?;

        let expected = match &members {
            Some(range) => declared_inputs - range.len(),
            None => declared_inputs,
        };

        let mut cubes = IndexSet::new();
        for row in self.rows {
            let values = match &members {
                Some(range) => {
                    let mut reduced = row.values.clone();
                    if range.end <= reduced.len() {
                        reduced.drain(range.clone());
                    }
                    reduced
                }
                None => row.values,
            };
            if values.len() != expected {
                return Err(Error::CubeLengthMismatch {
                    cube: values.iter().map(Ternary::to_string).collect(),
                    expected,
                    found: values.len(),
                });
            }
            if row.output != '1' {
                return Err(Error::UnexpectedOutput {
                    cube: values.iter().map(Ternary::to_string).collect(),
                    output: row.output,
                });
            }
            cubes.insert(values);
        }

        Ok((universe, cubes.into_iter().collect()))
    }
}

/// The ground universe of a run: the validated signature, the ordered list
/// of atoms (bit positions), and the elements of each sort as collected from
/// the atom arguments.
#[derive(Clone, Debug)]
pub struct Universe {
    pub signature: Signature,
    pub atoms: Vec<Atom>,
    pub elements: IndexMap<String, BTreeSet<String>>,
}

impl Universe {
    /// Collect the ground atoms of the header, resolving predicates and
    /// recording sort elements. Atoms whose predicate name begins with
    /// `member` are left out of the universe; their positions are returned
    /// so that the corresponding columns can be stripped from every cube.
    fn collect(
        mut signature: Signature,
        header: &[HeaderAtom],
    ) -> Result<(Self, Option<Range<usize>>), Error> {
        let mut atoms = Vec::new();
        let mut elements: IndexMap<String, BTreeSet<String>> = IndexMap::new();
        let mut member_positions = Vec::new();

        for (position, header_atom) in header.iter().enumerate() {
            let name = header_atom.normalized_name().to_lowercase();

            if name.starts_with("member") {
                member_positions.push(position);
                continue;
            }

            let name = signature.resolve_predicate(&name)?;
            let argument_sorts = &signature.predicates[&name];
            if argument_sorts.len() != header_atom.arguments.len() {
                return Err(Error::ArityMismatch {
                    predicate: name,
                    expected: argument_sorts.len(),
                    found: header_atom.arguments.len(),
                });
            }

            for (argument, sort) in header_atom.arguments.iter().zip(argument_sorts) {
                elements
                    .entry(sort.clone())
                    .or_default()
                    .insert(argument.clone());
            }

            let atom = Atom {
                predicate: name,
                arguments: header_atom.arguments.clone(),
            };
            if atoms.contains(&atom) {
                return Err(Error::DuplicateAtom(atom.to_string()));
            }
            atoms.push(atom);
        }

        let members = if member_positions.is_empty() {
            None
        } else {
            let first = member_positions[0];
            let last = member_positions[member_positions.len() - 1];
            if last - first + 1 != member_positions.len() {
                return Err(Error::ScatteredMemberRange);
            }
            Some(first..last + 1)
        };

        let universe = Universe {
            signature,
            atoms,
            elements,
        };
        Ok((universe, members))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{CubeRow, Declaration, Error, HeaderAtom, InputCubes, Parameter, Signature},
        crate::cube::values_from_str,
    };

    fn parameter(name: &str, sort: &str) -> Parameter {
        Parameter {
            name: name.into(),
            sort: sort.into(),
        }
    }

    fn header_atom(name: &str, arguments: &[&str]) -> HeaderAtom {
        HeaderAtom {
            name: name.into(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn row(values: &str, output: char) -> CubeRow {
        CubeRow {
            values: values_from_str(values).unwrap(),
            output,
        }
    }

    fn leq_signature() -> Signature {
        Signature::from_declarations(vec![
            Declaration::Sort { name: "Node".into() },
            Declaration::Relation {
                name: "leq".into(),
                parameters: vec![parameter("X", "Node"), parameter("Y", "Node")],
            },
        ])
        .unwrap()
    }

    #[test]
    fn declarations_are_case_folded_and_encoded() {
        let signature = Signature::from_declarations(vec![
            Declaration::Sort { name: "Node".into() },
            Declaration::Function {
                name: "owner".into(),
                parameters: vec![parameter("K", "key")],
                returns: "Node".into(),
            },
            Declaration::Function {
                name: "started".into(),
                parameters: vec![],
                returns: "bool".into(),
            },
            Declaration::Individual {
                name: "leader".into(),
                sort: "node".into(),
            },
        ])
        .unwrap();

        assert_eq!(signature.sorts, vec!["node"]);
        assert_eq!(signature.predicates["owner"], vec!["key", "node"]);
        assert_eq!(signature.predicates["started"], Vec::<String>::new());
        assert_eq!(signature.predicates["leader"], vec!["node"]);
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let result = Signature::from_declarations(vec![
            Declaration::Sort { name: "node".into() },
            Declaration::Sort { name: "NODE".into() },
        ]);
        assert!(matches!(result, Err(Error::DuplicateSort(_))));

        let result = Signature::from_declarations(vec![
            Declaration::Relation {
                name: "leq".into(),
                parameters: vec![],
            },
            Declaration::Relation {
                name: "leq".into(),
                parameters: vec![],
            },
        ]);
        assert!(matches!(result, Err(Error::DuplicatePredicate(_))));
    }

    #[test]
    fn header_atoms_define_the_universe() {
        let input = InputCubes {
            declared_inputs: Some(2),
            declared_outputs: Some(1),
            header: vec![
                header_atom("leq", &["n1", "n2"]),
                header_atom("leq", &["n2", "n1"]),
            ],
            output_names: vec!["out".into()],
            rows: vec![row("10", '1'), row("01", '1')],
        };

        let (universe, cubes) = input.validate(leq_signature()).unwrap();
        assert_eq!(universe.atoms.len(), 2);
        assert_eq!(universe.atoms[0].to_string(), "leq(n1,n2)");
        let nodes: Vec<_> = universe.elements["node"].iter().cloned().collect();
        assert_eq!(nodes, vec!["n1", "n2"]);
        assert_eq!(cubes.len(), 2);
    }

    #[test]
    fn duck_suffix_resolution_rebinds_the_declaration() {
        let input = InputCubes {
            declared_inputs: Some(1),
            declared_outputs: Some(1),
            header: vec![header_atom("proto.leq", &["n1", "n1"])],
            output_names: vec!["out".into()],
            rows: vec![row("1", '1')],
        };

        let (universe, _) = input.validate(leq_signature()).unwrap();
        assert_eq!(universe.atoms[0].predicate, "proto.leq");
        assert!(universe.signature.predicates.contains_key("proto.leq"));
        assert!(!universe.signature.predicates.contains_key("leq"));
    }

    #[test]
    fn header_names_are_normalized() {
        let input = InputCubes {
            declared_inputs: Some(1),
            declared_outputs: Some(1),
            header: vec![header_atom("__leq:3", &["n1", "n1"])],
            output_names: vec!["out".into()],
            rows: vec![row("1", '1')],
        };

        let (universe, _) = input.validate(leq_signature()).unwrap();
        assert_eq!(universe.atoms[0].predicate, "leq");
    }

    #[test]
    fn undefined_predicates_and_arities_are_fatal() {
        let input = InputCubes {
            declared_inputs: Some(1),
            declared_outputs: Some(1),
            header: vec![header_atom("gt", &["n1", "n1"])],
            output_names: vec!["out".into()],
            rows: vec![row("1", '1')],
        };
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::UndefinedPredicate(_))
        ));

        let input = InputCubes {
            declared_inputs: Some(1),
            declared_outputs: Some(1),
            header: vec![header_atom("leq", &["n1"])],
            output_names: vec!["out".into()],
            rows: vec![row("1", '1')],
        };
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn member_columns_are_stripped() {
        let signature = Signature::from_declarations(vec![
            Declaration::Sort { name: "node".into() },
            Declaration::Relation {
                name: "alive".into(),
                parameters: vec![parameter("N", "node")],
            },
        ])
        .unwrap();

        let input = InputCubes {
            declared_inputs: Some(4),
            declared_outputs: Some(1),
            header: vec![
                header_atom("alive", &["n1"]),
                header_atom("member", &["n1", "q1"]),
                header_atom("member", &["n2", "q1"]),
                header_atom("alive", &["n2"]),
            ],
            output_names: vec!["out".into()],
            rows: vec![row("1011", '1'), row("0110", '1')],
        };

        let (universe, cubes) = input.validate(signature).unwrap();
        assert_eq!(universe.atoms.len(), 2);
        assert_eq!(cubes[0], values_from_str("11").unwrap());
        assert_eq!(cubes[1], values_from_str("00").unwrap());
    }

    #[test]
    fn stripping_may_collapse_duplicate_cubes() {
        let signature = Signature::from_declarations(vec![
            Declaration::Sort { name: "node".into() },
            Declaration::Relation {
                name: "alive".into(),
                parameters: vec![parameter("N", "node")],
            },
        ])
        .unwrap();

        let input = InputCubes {
            declared_inputs: Some(2),
            declared_outputs: Some(1),
            header: vec![
                header_atom("alive", &["n1"]),
                header_atom("member", &["n1", "q1"]),
            ],
            output_names: vec!["out".into()],
            rows: vec![row("10", '1'), row("11", '1')],
        };

        let (_, cubes) = input.validate(signature).unwrap();
        assert_eq!(cubes, vec![values_from_str("1").unwrap()]);
    }

    #[test]
    fn scattered_member_range_is_fatal() {
        let signature = Signature::from_declarations(vec![
            Declaration::Sort { name: "node".into() },
            Declaration::Relation {
                name: "alive".into(),
                parameters: vec![parameter("N", "node")],
            },
        ])
        .unwrap();

        let input = InputCubes {
            declared_inputs: Some(3),
            declared_outputs: Some(1),
            header: vec![
                header_atom("member", &["n1", "q1"]),
                header_atom("alive", &["n1"]),
                header_atom("member", &["n2", "q1"]),
            ],
            output_names: vec!["out".into()],
            rows: vec![row("101", '1')],
        };
        assert!(matches!(
            input.validate(signature),
            Err(Error::ScatteredMemberRange)
        ));
    }

    #[test]
    fn malformed_headers_are_fatal() {
        let base = InputCubes {
            declared_inputs: Some(1),
            declared_outputs: Some(1),
            header: vec![header_atom("leq", &["n1", "n1"])],
            output_names: vec!["out".into()],
            rows: vec![row("1", '1')],
        };

        let mut input = base.clone();
        input.declared_inputs = Some(2);
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::InputCountMismatch { .. })
        ));

        let mut input = base.clone();
        input.declared_outputs = Some(2);
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::OutputCountNotOne)
        ));

        let mut input = base.clone();
        input.output_names.clear();
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::MissingOutputName)
        ));

        let mut input = base.clone();
        input.rows = vec![row("11", '1')];
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::CubeLengthMismatch { .. })
        ));

        let mut input = base;
        input.rows = vec![row("1", '0')];
        assert!(matches!(
            input.validate(leq_signature()),
            Err(Error::UnexpectedOutput { .. })
        ));
    }
}
