//! Formula dependency trees and variance attribution.
//!
//! A tree is built breadth-first into an arena with an explicit depth on
//! every node, so the depth budget never turns into call-stack depth. The
//! root sits at depth 0; a node whose depth equals the budget is a leaf that
//! keeps its cached value even if it holds a formula.

use std::collections::VecDeque;

use modelrecon_engine::formula::{analyze_formula, scan_references, Operator};
use modelrecon_engine::CellId;
use modelrecon_io::WorkbookGrid;

use crate::config::ReconConfig;
use crate::extract::find_label;
use crate::model::{
    ComplexityLevel, ComponentContribution, DrillDownResult, FormulaComplexity, FormulaComponent,
};
use crate::period::PeriodMatcher;

/// Upper bound on cells taken from the references of a single formula.
pub const MAX_EXPANDED_CELLS: usize = 1000;

// ---------------------------------------------------------------------------
// Complexity preview
// ---------------------------------------------------------------------------

/// Static complexity estimate used to decide whether a drill-down is worth
/// running.
pub fn complexity_of(formula: &str) -> FormulaComplexity {
    let profile = analyze_formula(formula);
    let complexity = if profile.reference_count > 10 || profile.max_nesting > 3 || profile.has_external_refs {
        ComplexityLevel::Complex
    } else if profile.reference_count <= 3 && profile.max_nesting <= 1 && !profile.has_cross_sheet_refs {
        ComplexityLevel::Simple
    } else {
        ComplexityLevel::Moderate
    };

    FormulaComplexity {
        reference_count: profile.reference_count,
        estimated_depth: profile.max_nesting,
        has_cross_sheet_refs: profile.has_cross_sheet_refs,
        has_external_refs: profile.has_external_refs,
        main_function: profile.main_function().map(String::from),
        complexity,
        top_level_operator: profile.top_level_operator,
    }
}

// ---------------------------------------------------------------------------
// Dependency tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// `None` for references into another workbook
    pub cell: Option<CellId>,
    pub reference: String,
    pub name: String,
    pub value: f64,
    pub formula: Option<String>,
    pub depth: usize,
    pub resolved: bool,
    pub children: Vec<usize>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of nodes; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyTree {
    nodes: Vec<TreeNode>,
}

impl DependencyTree {
    /// Walk the formula at `root` down to `max_depth` levels of references.
    pub fn build(
        workbook: &WorkbookGrid,
        root: &CellId,
        root_name: &str,
        max_depth: usize,
        config: &ReconConfig,
    ) -> Self {
        let matcher = PeriodMatcher::new(&config.periods);
        let label_cols = config.structure.label_scan_columns;

        let mut nodes = vec![read_node(workbook, root.clone(), 0)];
        nodes[0].name = root_name.to_string();

        let mut queue = VecDeque::from([0usize]);
        while let Some(idx) = queue.pop_front() {
            let depth = nodes[idx].depth;
            if depth >= max_depth {
                continue;
            }
            let (Some(formula), Some(cell)) = (nodes[idx].formula.clone(), nodes[idx].cell.clone()) else {
                continue;
            };

            let mut budget = MAX_EXPANDED_CELLS;
            for r in scan_references(&formula) {
                if budget == 0 {
                    log::warn!("{}: references truncated after {} cells", cell, MAX_EXPANDED_CELLS);
                    break;
                }
                if r.is_external() {
                    log::warn!("{}: external reference '{}' cannot be followed", cell, r.text);
                    let child = TreeNode {
                        cell: None,
                        reference: r.text.clone(),
                        name: r.text.clone(),
                        value: 0.0,
                        formula: None,
                        depth: depth + 1,
                        resolved: false,
                        children: Vec::new(),
                    };
                    nodes.push(child);
                    let child_idx = nodes.len() - 1;
                    nodes[idx].children.push(child_idx);
                    budget -= 1;
                    continue;
                }

                let sheet = r.sheet.clone().unwrap_or_else(|| cell.sheet.clone());
                for addr in r.cells().take(budget) {
                    budget -= 1;
                    let id = CellId { sheet: sheet.clone(), addr };
                    let mut child = read_node(workbook, id, depth + 1);
                    if child.resolved {
                        child.name = workbook
                            .sheet(&sheet)
                            .and_then(|grid| find_label(grid, addr.row, label_cols, &matcher))
                            .unwrap_or_else(|| child.reference.clone());
                    }
                    nodes.push(child);
                    let child_idx = nodes.len() - 1;
                    nodes[idx].children.push(child_idx);
                    queue.push_back(child_idx);
                }
            }
        }

        log::debug!("dependency tree for {}: {} node(s)", root, nodes.len());
        Self { nodes }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Owned nested view for reporting.
    pub fn to_component(&self) -> FormulaComponent {
        self.component_at(0)
    }

    fn component_at(&self, idx: usize) -> FormulaComponent {
        let node = &self.nodes[idx];
        FormulaComponent {
            name: node.name.clone(),
            cell_reference: node.reference.clone(),
            value: node.value,
            is_leaf: node.is_leaf(),
            formula: node.formula.clone(),
            resolved: node.resolved,
            children: node.children.iter().map(|&c| self.component_at(c)).collect(),
        }
    }
}

fn read_node(workbook: &WorkbookGrid, id: CellId, depth: usize) -> TreeNode {
    let reference = id.to_string();
    let mut node = TreeNode {
        cell: None,
        reference: reference.clone(),
        name: reference,
        value: 0.0,
        formula: None,
        depth,
        resolved: false,
        children: Vec::new(),
    };
    match workbook.sheet(&id.sheet) {
        None => {
            log::warn!("cannot resolve {}: sheet '{}' not in workbook", node.reference, id.sheet);
        }
        Some(grid) => {
            node.resolved = true;
            // A blank cell reads as 0.
            if let Some(cell) = grid.cell(id.addr.row, id.addr.col) {
                node.value = cell.value.as_number().unwrap_or(0.0);
                node.formula = cell.formula.clone();
            }
        }
    }
    node.cell = Some(id);
    node
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Sum of leaf deltas under one structural position of the two trees.
///
/// Positions are paired by child index, not by name. A side missing at some
/// position reads as 0; once either side is a leaf the position contributes
/// its plain value delta.
fn position_contribution(old: &DependencyTree, new: &DependencyTree, start: (Option<usize>, Option<usize>)) -> f64 {
    let mut total = 0.0;
    let mut stack = vec![start];
    while let Some((o, n)) = stack.pop() {
        let old_node = o.map(|i| old.node(i));
        let new_node = n.map(|i| new.node(i));
        match (old_node, new_node) {
            (Some(a), Some(b)) if !a.is_leaf() && !b.is_leaf() => {
                let width = a.children.len().max(b.children.len());
                for k in 0..width {
                    stack.push((a.children.get(k).copied(), b.children.get(k).copied()));
                }
            }
            (a, b) => {
                total += b.map(|x| x.value).unwrap_or(0.0) - a.map(|x| x.value).unwrap_or(0.0);
            }
        }
    }
    total
}

/// Attribute the change of the root cell to its direct inputs.
pub fn attribute(
    source_item: &str,
    sheet_name: &str,
    old: &DependencyTree,
    new: &DependencyTree,
    epsilon: f64,
) -> DrillDownResult {
    let old_root = old.root();
    let new_root = new.root();
    let total_variance = new_root.value - old_root.value;

    let width = old_root.children.len().max(new_root.children.len());
    let mut components = Vec::with_capacity(width);
    for k in 0..width {
        let o = old_root.children.get(k).copied();
        let n = new_root.children.get(k).copied();
        let contribution = position_contribution(old, new, (o, n));
        let Some(shown) = n.map(|i| new.node(i)).or_else(|| o.map(|i| old.node(i))) else {
            continue;
        };
        components.push(ComponentContribution {
            name: shown.name.clone(),
            cell_reference: shown.reference.clone(),
            value: n.map(|i| new.node(i).value).unwrap_or(0.0),
            variance_contribution: contribution,
            is_leaf: shown.is_leaf(),
            has_formula: shown.formula.is_some(),
        });
    }

    let total_explained: f64 = components.iter().map(|c| c.variance_contribution).sum();
    let unexplained_variance = total_variance - total_explained;

    let mut warnings = Vec::new();
    let root_formula = new_root.formula.as_deref().or(old_root.formula.as_deref());
    if let Some(formula) = root_formula {
        if let Some(reason) = non_additive_reason(formula) {
            log::warn!("{} ({}): {}", source_item, new_root.reference, reason);
            warnings.push(format!("{reason}; attribution by summed input deltas is approximate"));
        }
    }
    if total_explained.abs() > total_variance.abs() + epsilon {
        log::warn!(
            "{}: explained {} exceeds total variance {}",
            source_item,
            total_explained,
            total_variance
        );
        warnings.push(format!(
            "explained variance {total_explained} exceeds total variance {total_variance}"
        ));
    }

    DrillDownResult {
        source_item: source_item.to_string(),
        source_value: new_root.value,
        old_value: old_root.value,
        total_variance,
        total_explained,
        unexplained_variance,
        drill_down_path: vec![sheet_name.to_string(), source_item.to_string(), new_root.reference.clone()],
        components,
        warnings,
        old_tree: old.to_component(),
        new_tree: new.to_component(),
    }
}

/// Why summing input deltas misstates this formula, if it does.
fn non_additive_reason(formula: &str) -> Option<String> {
    let profile = analyze_formula(formula);
    match profile.top_level_operator {
        Some(op @ (Operator::Mul | Operator::Div | Operator::Pow)) => {
            return Some(format!("formula combines inputs with '{}'", op.symbol()));
        }
        Some(_) if profile.negates_at_top_level => {
            return Some("formula subtracts inputs, whose deltas are summed unsigned".to_string());
        }
        Some(_) => return None,
        None => {}
    }
    match profile.main_function() {
        Some(f) if f != "SUM" => Some(format!("formula is driven by {f}()")),
        _ => None,
    }
}
