use std::{
    fmt::{Display, Formatter},
    ops::{Deref, DerefMut},
};

/// Line-oriented helper for the CPLEX LP text format.
pub(crate) struct LpWriter<'a, 'b>(&'a mut Formatter<'b>);

impl<'a, 'b> Deref for LpWriter<'a, 'b> {
    type Target = Formatter<'b>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<'a, 'b> DerefMut for LpWriter<'a, 'b> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<'a, 'b> LpWriter<'a, 'b> {
    pub(crate) fn new(f: &'a mut Formatter<'b>) -> Self {
        Self(f)
    }

    pub(crate) fn line<T: Display>(&mut self, value: T) -> std::fmt::Result {
        writeln!(self, "{value}")
    }

    pub(crate) fn comment<T: Display>(&mut self, value: T) -> std::fmt::Result {
        writeln!(self, "\\ {value}")
    }

    /// Writes ` label: a x + b y` without a trailing newline.
    pub(crate) fn labeled_terms<N: Display>(
        &mut self,
        label: &str,
        terms: &[(f64, N)],
    ) -> std::fmt::Result {
        write!(self, " {label}:")?;
        if terms.is_empty() {
            return write!(self, " 0");
        }

        for (idx, (coeff, name)) in terms.iter().enumerate() {
            let (sign, magnitude) = if *coeff < 0.0 {
                ("-", -coeff)
            } else {
                ("+", *coeff)
            };
            if idx == 0 && sign == "+" {
                write!(self, " {magnitude} {name}")?;
            } else {
                write!(self, " {sign} {magnitude} {name}")?;
            }
        }
        Ok(())
    }

    pub(crate) fn names<N: Display>(&mut self, section: &str, names: &[N]) -> std::fmt::Result {
        if names.is_empty() {
            return Ok(());
        }
        self.line(section)?;
        for name in names {
            writeln!(self, " {name}")?;
        }
        Ok(())
    }
}
