use {
    crate::{
        cube::{Cube, PiClass},
        protocol::Atom,
    },
    itertools::Itertools,
    std::fmt::{self, Display, Formatter},
};

/// The cover-table CNF in DIMACS syntax: one clause per class member, the
/// negated activation variable first.
pub struct Dimacs<'a> {
    pub classes: &'a [PiClass],
    pub max_input_var: i32,
}

impl Display for Dimacs<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let top = self
            .classes
            .iter()
            .map(|class| class.id)
            .max()
            .unwrap_or_default()
            .max(self.max_input_var);
        let count: usize = self.classes.iter().map(PiClass::size).sum();

        writeln!(f, "p cnf {top} {count}")?;
        for class in self.classes {
            for member in &class.eq_class {
                write!(f, "{}", -class.id)?;
                for literal in &member.care_neg {
                    write!(f, " {literal}")?;
                }
                writeln!(f, " 0")?;
            }
        }
        Ok(())
    }
}

/// The class-summary file: one semicolon-separated record per class with the
/// id, the (quantified) cost, the representative's care literals, and the
/// quantified form when one is known. Quantified costs are reported as soon
/// as the first class carries one.
pub struct ClassInfo<'a> {
    pub classes: &'a [PiClass],
}

impl Display for ClassInfo<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let quantified = self
            .classes
            .first()
            .is_some_and(|class| class.qcost != 0);

        for class in self.classes {
            let cost = if quantified { class.qcost } else { class.cost };
            let form = if quantified {
                class.quantified_form.as_str()
            } else {
                "none"
            };
            writeln!(
                f,
                "{};{};{}; {}",
                class.id,
                cost,
                class.representative().care.iter().join(" "),
                form
            )?;
        }
        Ok(())
    }
}

/// A cube's care positions as a conjunction over atoms, `~`-prefixed where
/// the atom is false. Atom order is alphabetical, matching no particular
/// input order on purpose: the form is for human consumption.
pub struct CareConjunction<'a> {
    pub cube: &'a Cube,
    pub atoms: &'a [Atom],
}

impl Display for CareConjunction<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self
            .cube
            .values
            .iter()
            .zip(self.atoms)
            .filter(|(value, _)| value.is_care())
            .map(|(value, atom)| {
                if matches!(value, crate::cube::Ternary::True) {
                    atom.to_string()
                } else {
                    format!("~{atom}")
                }
            })
            .sorted()
            .collect();
        write!(f, "{}", literals.join(" & "))
    }
}
