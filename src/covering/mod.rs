use {
    crate::{
        cube::PiClass,
        solving::{self, Solver},
    },
    anyhow::Result,
    indexmap::IndexMap,
    std::collections::HashSet,
};

/// The cover table of a set of prime-implicant classes, encoded as a CNF in
/// an incremental SAT solver: for every member cube of every class, the
/// clause `(-id ∨ care_neg(member))`. Assuming a class id activates the
/// clauses that rule out the region of all of its members.
///
/// The clauses are also kept as plain literal lists; they feed the DIMACS
/// dump and the unit-propagation oracle that scores class coverage.
pub struct CoverTable {
    solver: Solver,
    clauses: Vec<Vec<i32>>,
    max_input_var: i32,
}

impl CoverTable {
    pub fn new(classes: &IndexMap<i32, PiClass>, max_input_var: i32) -> Result<Self> {
        let mut clauses = Vec::new();
        let mut top_variable = max_input_var;

        for (&id, class) in classes {
            top_variable = top_variable.max(id);
            for member in &class.eq_class {
                let mut clause = Vec::with_capacity(member.care_neg.len() + 1);
                clause.push(-id);
                clause.extend_from_slice(&member.care_neg);
                clauses.push(clause);
            }
        }

        let mut solver = Solver::new();
        solver.reserve(top_variable)?;
        for clause in &clauses {
            solver.add_clause(clause)?;
        }

        Ok(CoverTable {
            solver,
            clauses,
            max_input_var,
        })
    }

    pub fn sat_calls(&self) -> usize {
        self.solver.calls()
    }

    pub fn solve(&mut self, assumptions: &[i32]) -> Result<bool> {
        self.solver.solve(assumptions)
    }

    pub fn propagate(&self, assumptions: &[i32]) -> (bool, Vec<i32>) {
        solving::propagate(&self.clauses, assumptions)
    }

    /// The classes that are essential even when every other class is active:
    /// a model under the representative's care literals plus all other ids
    /// is a state only this class rules out.
    pub fn root_essentials(&mut self, classes: &IndexMap<i32, PiClass>) -> Result<Vec<i32>> {
        let mut essentials = Vec::new();
        for (&id, class) in classes {
            let mut assumptions = class.representative().care.clone();
            assumptions.extend(classes.keys().copied().filter(|&other| other != id));
            if self.solve(&assumptions)? {
                essentials.push(id);
            }
        }
        Ok(essentials)
    }

    /// Move every undecided class that is already covered by the active set
    /// onto the trail as excluded. Classes that stay undecided get their
    /// coverage score refreshed: the number of input-variable literals that
    /// unit propagation fixes once the class's representative is assumed.
    pub fn remove_covered(
        &mut self,
        classes: &mut IndexMap<i32, PiClass>,
        ptrail: &[i32],
        unk: &mut Vec<i32>,
        trail: &mut Vec<i32>,
    ) -> Result<Vec<i32>> {
        let mut covered = Vec::new();
        let mut remaining = Vec::new();

        for &id in unk.iter() {
            let mut assumptions = classes[&id].representative().care.clone();
            assumptions.extend_from_slice(ptrail);

            if self.solve(&assumptions)? {
                let (_, assigned) = self.propagate(&assumptions);
                classes[&id].coverage = assigned
                    .iter()
                    .filter(|&&literal| literal.abs() <= self.max_input_var)
                    .count();
                remaining.push(id);
            } else {
                trail.push(-id);
                covered.push(id);
            }
        }

        if !covered.is_empty() {
            *unk = remaining;
        }
        Ok(covered)
    }

    /// Promote every undecided class that became essential under the current
    /// active set: with all other undecided classes active as well, a model
    /// under the representative's care literals means nothing else rules out
    /// that state.
    pub fn conditional_essentials(
        &mut self,
        classes: &IndexMap<i32, PiClass>,
        ptrail: &mut Vec<i32>,
        unk: &mut Vec<i32>,
        trail: &mut Vec<i32>,
    ) -> Result<Vec<i32>> {
        if ptrail.len() == trail.len() {
            // Nothing has been excluded yet, so no new essential can arise.
            return Ok(Vec::new());
        }

        let active = ptrail.clone();
        let mut essentials = Vec::new();
        let mut remaining = Vec::new();

        for &id in unk.iter() {
            let mut assumptions = classes[&id].representative().care.clone();
            assumptions.extend_from_slice(&active);
            assumptions.extend(unk.iter().copied().filter(|&other| other != id));

            if self.solve(&assumptions)? {
                essentials.push(id);
                trail.push(id);
                ptrail.push(id);
            } else {
                remaining.push(id);
            }
        }

        if !essentials.is_empty() {
            *unk = remaining;
        }
        Ok(essentials)
    }

    /// Compare the model sets (projected to the input variables) of the full
    /// cover table and of the selected classes alone. Equality means the
    /// selection rules out exactly the same states as all classes together.
    pub fn compare_solutions(
        &self,
        classes: &IndexMap<i32, PiClass>,
        selected: &[i32],
    ) -> Result<bool> {
        let mut full = Solver::new();
        let mut chosen = Solver::new();
        full.reserve(self.max_input_var)?;
        chosen.reserve(self.max_input_var)?;

        for (id, class) in classes {
            for member in &class.eq_class {
                full.add_clause(&member.care_neg)?;
                if selected.contains(id) {
                    chosen.add_clause(&member.care_neg)?;
                }
            }
        }

        let reference = model_projections(&mut full, self.max_input_var)?;
        let candidate = model_projections(&mut chosen, self.max_input_var)?;
        tracing::debug!(
            reference = reference.len(),
            candidate = candidate.len(),
            "compared solution model sets"
        );
        Ok(reference == candidate)
    }
}

/// All models of the solver, projected to the variables 1..=top.
fn model_projections(solver: &mut Solver, top: i32) -> Result<HashSet<Vec<i32>>> {
    let mut projections = HashSet::new();
    while solver.solve(&[])? {
        let mut projection = Vec::with_capacity(top as usize);
        for variable in 1..=top {
            if solver.is_true(variable)? {
                projection.push(variable);
            } else {
                projection.push(-variable);
            }
        }
        let blocking: Vec<i32> = projection.iter().map(|&literal| -literal).collect();
        projections.insert(projection);
        solver.add_clause(&blocking)?;
    }
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use {
        super::CoverTable,
        crate::{
            cube::{values_from_str, CubeFactory, PiClass},
            protocol::Atom,
        },
        indexmap::IndexMap,
    };

    fn constant_atoms() -> Vec<Atom> {
        ["p", "q"]
            .iter()
            .map(|name| Atom {
                predicate: name.to_string(),
                arguments: vec![],
            })
            .collect()
    }

    fn classes_from(reprs: &[&str]) -> IndexMap<i32, PiClass> {
        let atoms = constant_atoms();
        let mut factory = CubeFactory::new(3);
        let mut classes = IndexMap::new();
        for repr in reprs {
            let class = PiClass::new(factory.cube(values_from_str(repr).unwrap()), &atoms);
            classes.insert(class.id, class);
        }
        classes
    }

    #[test]
    fn root_essentials_and_redundancy() {
        // p and q each uniquely rule out a state; p ∧ q is subsumed by them.
        let mut classes = classes_from(&["1-", "-1", "11"]);
        let mut table = CoverTable::new(&classes, 2).unwrap();

        let essentials = table.root_essentials(&classes).unwrap();
        assert_eq!(essentials, vec![3, 4]);

        let ptrail = vec![3, 4];
        let mut unk = vec![5];
        let mut trail = vec![3, 4];
        let covered = table
            .remove_covered(&mut classes, &ptrail, &mut unk, &mut trail)
            .unwrap();
        assert_eq!(covered, vec![5]);
        assert!(unk.is_empty());
        assert_eq!(trail, vec![3, 4, -5]);
    }

    #[test]
    fn coverage_counts_propagated_input_literals() {
        let mut classes = classes_from(&["1-", "11"]);
        let mut table = CoverTable::new(&classes, 2).unwrap();

        let mut unk = vec![3, 4];
        let mut trail = Vec::new();
        let covered = table
            .remove_covered(&mut classes, &[], &mut unk, &mut trail)
            .unwrap();
        assert!(covered.is_empty());

        // Assuming `1-` fixes one input literal, assuming `11` fixes two.
        assert_eq!(classes[&3].coverage, 1);
        assert_eq!(classes[&4].coverage, 2);
    }

    #[test]
    fn conditional_essentials_after_exclusion() {
        let classes = classes_from(&["1-", "11"]);
        let mut table = CoverTable::new(&classes, 2).unwrap();

        // With nothing excluded the shortcut applies.
        let mut ptrail = vec![];
        let mut unk = vec![3, 4];
        let mut trail = vec![];
        let essentials = table
            .conditional_essentials(&classes, &mut ptrail, &mut unk, &mut trail)
            .unwrap();
        assert!(essentials.is_empty());

        // Excluding the broad class makes the narrow one essential.
        let mut trail = vec![-3];
        let mut unk = vec![4];
        let essentials = table
            .conditional_essentials(&classes, &mut ptrail, &mut unk, &mut trail)
            .unwrap();
        assert_eq!(essentials, vec![4]);
        assert_eq!(ptrail, vec![4]);
        assert_eq!(trail, vec![-3, 4]);
        assert!(unk.is_empty());
    }

    #[test]
    fn solution_comparison() {
        let classes = classes_from(&["1-", "-1", "11"]);
        let table = CoverTable::new(&classes, 2).unwrap();

        // {p, q} rules out the same states as all three classes together,
        // {p ∧ q} alone does not.
        assert!(table.compare_solutions(&classes, &[3, 4]).unwrap());
        assert!(!table.compare_solutions(&classes, &[5]).unwrap());
    }
}
