use super::types::WithdrawalStrategyKind;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WithdrawalRequest {
    pub balance: f64,
    /// Years since the first retirement withdrawal, 0 for the first.
    pub year_index: u32,
    pub target_income: f64,
    /// Passed through for callers; none of the built-in strategies read it.
    pub age: u32,
    pub is_rmd_year: bool,
    pub rmd_amount: f64,
}

/// A withdrawal strategy plus the state it carries between years.
#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawalPolicy {
    kind: WithdrawalStrategyKind,
    inflation: f64,
    initial_amount: Option<f64>,
}

impl WithdrawalPolicy {
    pub fn new(kind: WithdrawalStrategyKind, inflation: f64) -> Self {
        Self {
            kind,
            inflation,
            initial_amount: None,
        }
    }

    /// The annual target income this strategy is configured for, if any.
    pub fn target_income(&self) -> f64 {
        match self.kind {
            WithdrawalStrategyKind::NeedBased { target_monthly } => target_monthly * 12.0,
            _ => 0.0,
        }
    }

    /// What the strategy wants to draw this year, before the RMD floor and the balance clamp.
    fn planned(&mut self, request: &WithdrawalRequest) -> f64 {
        let amount = match self.kind {
            WithdrawalStrategyKind::FixedRealRate { initial_rate } => {
                let initial = *self
                    .initial_amount
                    .get_or_insert(request.balance.max(0.0) * initial_rate);
                initial * (1.0 + self.inflation).powi(request.year_index as i32)
            }
            WithdrawalStrategyKind::NeedBased { .. } => request.target_income,
            WithdrawalStrategyKind::VariablePercentage { rate } => request.balance.max(0.0) * rate,
        };
        amount.max(0.0)
    }

    /// This year's draw. `share` scales the plan for a part-year retirement or
    /// survivor spending; the RMD floor and the balance clamp are applied after.
    pub fn withdrawal(&mut self, request: &WithdrawalRequest, share: f64) -> f64 {
        let planned = self.planned(request) * share;
        apply_rmd_floor(planned, request)
    }
}

/// Floors at the RMD when one is due, then never returns more than the balance.
fn apply_rmd_floor(amount: f64, request: &WithdrawalRequest) -> f64 {
    let floored = if request.is_rmd_year && amount < request.rmd_amount {
        request.rmd_amount
    } else {
        amount
    };
    floored.clamp(0.0, request.balance.max(0.0))
}
