//! Step templates and branch resolution.
//!
//! A [`StepTemplate`] is the declared shape of a wizard: plain step ids
//! interleaved with [`BranchGroup`]s, each of which contributes at most one
//! of its named branches at runtime. [`StepTemplate::build_active_steps`]
//! flattens the template into the concrete, ordered list of steps a run
//! walks through.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Whether a branch has been switched on or off for a run.
///
/// A branch with no directive is undecided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchDirective {
    /// The branch is selected.
    Enabled,
    /// The branch may not be selected, not even by default.
    Disabled,
}

/// Branch directives recorded for a run, keyed by branch name.
pub type BranchDirectives = BTreeMap<String, BranchDirective>;

/// One named alternative inside a [`BranchGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// The branch name, used as the key in [`BranchDirectives`].
    pub name: String,
    /// Steps contributed when this branch is selected.
    pub steps: StepTemplate,
}

/// A point in the template where one of several branches is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchGroup {
    /// Branches in declaration order.
    pub branches: Vec<Branch>,
}

impl BranchGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
        }
    }

    /// Adds a branch to the group.
    pub fn branch(mut self, name: impl Into<String>, steps: impl Into<StepTemplate>) -> Self {
        self.branches.push(Branch {
            name: name.into(),
            steps: steps.into(),
        });
        self
    }

    /// Picks the branch this group contributes.
    ///
    /// The first enabled branch in declaration order wins. Failing that,
    /// with `default_branch` set, the first branch that is not disabled is
    /// taken.
    fn select(&self, directives: &BranchDirectives, default_branch: bool) -> Option<&Branch> {
        self.branches
            .iter()
            .find(|b| directives.get(&b.name) == Some(&BranchDirective::Enabled))
            .or_else(|| {
                if default_branch {
                    self.branches
                        .iter()
                        .find(|b| directives.get(&b.name) != Some(&BranchDirective::Disabled))
                } else {
                    None
                }
            })
    }
}

impl Default for BranchGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// An element of a [`StepTemplate`].
///
/// Serialized untagged: a plain string is a step, an object is a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateElement {
    /// A plain step id.
    Step(String),
    /// A branch group.
    Group(BranchGroup),
}

impl From<&str> for TemplateElement {
    fn from(step: &str) -> Self {
        Self::Step(step.to_string())
    }
}

impl From<String> for TemplateElement {
    fn from(step: String) -> Self {
        Self::Step(step)
    }
}

impl From<BranchGroup> for TemplateElement {
    fn from(group: BranchGroup) -> Self {
        Self::Group(group)
    }
}

/// The declared, possibly branching, sequence of wizard steps.
///
/// # Example
///
/// ```
/// use stepwise::{BranchDirective, BranchDirectives, BranchGroup, StepTemplate};
///
/// let template = StepTemplate::new()
///     .step("account")
///     .group(BranchGroup::new().branch("business", ["company"]).branch("personal", ["profile"]))
///     .step("confirm");
///
/// let mut directives = BranchDirectives::new();
/// assert_eq!(
///     template.build_active_steps(&directives, true),
///     vec!["account", "company", "confirm"]
/// );
///
/// directives.insert("personal".to_string(), BranchDirective::Enabled);
/// assert_eq!(
///     template.build_active_steps(&directives, true),
///     vec!["account", "profile", "confirm"]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTemplate {
    elements: Vec<TemplateElement>,
}

impl StepTemplate {
    /// Creates an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plain step.
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.elements.push(TemplateElement::Step(step.into()));
        self
    }

    /// Appends a branch group.
    pub fn group(mut self, group: BranchGroup) -> Self {
        self.elements.push(TemplateElement::Group(group));
        self
    }

    /// Returns the template elements in order.
    pub fn elements(&self) -> &[TemplateElement] {
        &self.elements
    }

    /// Returns true if the template declares nothing.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Flattens the template into the steps a run walks through.
    ///
    /// Depth first, in declaration order. Each group contributes the steps
    /// of its selected branch, or nothing.
    pub fn build_active_steps(
        &self,
        directives: &BranchDirectives,
        default_branch: bool,
    ) -> Vec<String> {
        let mut steps = Vec::new();
        self.flatten_into(directives, default_branch, &mut steps);
        steps
    }

    fn flatten_into(
        &self,
        directives: &BranchDirectives,
        default_branch: bool,
        out: &mut Vec<String>,
    ) {
        for element in &self.elements {
            match element {
                TemplateElement::Step(step) => out.push(step.clone()),
                TemplateElement::Group(group) => {
                    if let Some(branch) = group.select(directives, default_branch) {
                        branch.steps.flatten_into(directives, default_branch, out);
                    }
                }
            }
        }
    }

    /// Returns every step id any branch combination could reach, without
    /// duplicates, in first-seen order.
    pub fn all_steps(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut steps = Vec::new();
        self.collect_all(&mut seen, &mut steps);
        steps
    }

    fn collect_all(&self, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for element in &self.elements {
            match element {
                TemplateElement::Step(step) => {
                    if seen.insert(step.clone()) {
                        out.push(step.clone());
                    }
                }
                TemplateElement::Group(group) => {
                    for branch in &group.branches {
                        branch.steps.collect_all(seen, out);
                    }
                }
            }
        }
    }
}

impl<T: Into<TemplateElement>> FromIterator<T> for StepTemplate {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<T: Into<TemplateElement>, const N: usize> From<[T; N]> for StepTemplate {
    fn from(elements: [T; N]) -> Self {
        elements.into_iter().collect()
    }
}

impl<T: Into<TemplateElement>> From<Vec<T>> for StepTemplate {
    fn from(elements: Vec<T>) -> Self {
        elements.into_iter().collect()
    }
}
