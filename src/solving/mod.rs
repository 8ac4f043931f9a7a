use {
    anyhow::Result,
    rustsat::{
        instances::Cnf,
        solvers::{Solve, SolveIncremental, SolverResult},
        types::{Clause, Lit, TernaryVal, Var},
    },
    rustsat_batsat::BasicSolver,
    std::collections::HashMap,
};

/// Translate a DIMACS-signed literal into the backend representation.
/// Variable `v` (1-based) becomes index `v - 1`.
pub fn lit(external: i32) -> Lit {
    if external > 0 {
        Lit::positive(external as u32 - 1)
    } else {
        Lit::negative((-external) as u32 - 1)
    }
}

/// The inverse of [`lit`].
pub fn external(literal: Lit) -> i32 {
    let variable = literal.var().idx() as i32 + 1;
    if literal.is_pos() {
        variable
    } else {
        -variable
    }
}

/// A thin incremental SAT facade over the batsat backend. The whole pipeline
/// speaks DIMACS-signed `i32` literals; this is the only place where they
/// are translated. Swapping the backend is a matter of changing this module.
pub struct Solver {
    backend: BasicSolver,
    calls: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            backend: BasicSolver::default(),
            calls: 0,
        }
    }

    /// Make the backend aware of all variables up to `top`, so that they may
    /// appear in assumptions even when no clause mentions them yet.
    pub fn reserve(&mut self, top: i32) -> Result<()> {
        if top > 0 {
            self.backend.reserve(Var::new(top as u32 - 1))?;
        }
        Ok(())
    }

    pub fn add_clause(&mut self, literals: &[i32]) -> Result<()> {
        let clause: Clause = literals.iter().map(|&l| lit(l)).collect();
        self.backend.add_clause(clause)?;
        Ok(())
    }

    pub fn add_cnf(&mut self, cnf: Cnf) -> Result<()> {
        self.backend.add_cnf(cnf)?;
        Ok(())
    }

    pub fn solve(&mut self, assumptions: &[i32]) -> Result<bool> {
        self.calls += 1;
        let assumptions: Vec<Lit> = assumptions.iter().map(|&l| lit(l)).collect();
        let result = self.backend.solve_assumps(&assumptions)?;
        Ok(matches!(result, SolverResult::Sat))
    }

    /// Whether `literal` is true in the most recent model.
    pub fn is_true(&self, literal: i32) -> Result<bool> {
        Ok(matches!(self.backend.lit_val(lit(literal))?, TernaryVal::True))
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

/// Unit propagation over an explicit clause list. Returns whether the
/// assumptions propagate without conflict, together with the assigned
/// literals (assumptions first, then derived units in derivation order).
pub fn propagate(clauses: &[Vec<i32>], assumptions: &[i32]) -> (bool, Vec<i32>) {
    let mut values: HashMap<i32, bool> = HashMap::new();
    let mut trail = Vec::new();

    for &assumption in assumptions {
        match values.get(&assumption.abs()) {
            Some(&value) if value != (assumption > 0) => return (false, trail),
            Some(_) => (),
            None => {
                values.insert(assumption.abs(), assumption > 0);
                trail.push(assumption);
            }
        }
    }

    loop {
        let mut changed = false;
        for clause in clauses {
            let mut unassigned = None;
            let mut open = 0;
            let mut satisfied = false;
            for &literal in clause {
                match values.get(&literal.abs()) {
                    Some(&value) if value == (literal > 0) => {
                        satisfied = true;
                        break;
                    }
                    Some(_) => (),
                    None => {
                        open += 1;
                        unassigned = Some(literal);
                    }
                }
            }
            if satisfied {
                continue;
            }
            match (open, unassigned) {
                (0, _) => return (false, trail),
                (1, Some(unit)) => {
                    values.insert(unit.abs(), unit > 0);
                    trail.push(unit);
                    changed = true;
                }
                _ => (),
            }
        }
        if !changed {
            break;
        }
    }

    (true, trail)
}
