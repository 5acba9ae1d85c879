//! Outbound port to an external policy engine.
//!
//! Policy text is opaque to Portcullis: an evaluator receives one
//! policy's content plus the principal's attributes as canonical JSON,
//! and answers whether the policy permits the request.

use crate::error::PortcullisResult;

pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate a single policy. An `Err` means the evaluator could not
    /// reach a verdict and must not be read as a denial.
    fn evaluate(
        &self,
        policy_content: &str,
        attributes_json: &str,
    ) -> impl Future<Output = PortcullisResult<bool>> + Send;
}
