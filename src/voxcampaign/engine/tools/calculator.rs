//! Scientific calculator tool, registered by default on every engine.
//!
//! Supports arithmetic, trigonometric (and inverse/hyperbolic), logarithmic,
//! and statistical functions over `evalexpr`, with a few rewrites for names
//! evalexpr doesn't know natively (`csc`, `sec`, `cot`, `log`, `log2`, ...).
//! All angles are radians.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use evalexpr::ContextWithMutableVariables;
use serde::Deserialize;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::error::{VoxError, VoxResult};

#[derive(Debug, Clone)]
pub struct CalculatorError {
    message: String,
}

impl CalculatorError {
    pub fn new(message: impl Into<String>) -> Self {
        CalculatorError { message: message.into() }
    }
}

impl fmt::Display for CalculatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "calculator error: {}", self.message)
    }
}

impl std::error::Error for CalculatorError {}

pub type CalculatorResult = Result<f64, CalculatorError>;

/// Stateless; safe to share across every concurrent call.
#[derive(Clone, Default)]
pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Calculator
    }

    pub async fn evaluate(&self, expression: &str) -> CalculatorResult {
        let expression = expression.trim();
        if let Ok(result) = self.try_statistical_function(expression) {
            return Ok(result);
        }
        self.evaluate_math_expression(expression)
    }

    fn evaluate_math_expression(&self, expression: &str) -> CalculatorResult {
        let expr = self.prepare_expression(expression)?;
        let mut context: evalexpr::HashMapContext = evalexpr::HashMapContext::new();
        let _ = context.set_value("math::PI".to_string(), evalexpr::Value::Float(std::f64::consts::PI));
        let _ = context.set_value("math::E".to_string(), evalexpr::Value::Float(std::f64::consts::E));

        match evalexpr::eval_with_context(&expr, &context) {
            Ok(value) => value.as_number().map_err(|_| CalculatorError::new("result is not a number")),
            Err(e) => Err(CalculatorError::new(format!("evaluation error: {e}"))),
        }
    }

    fn prepare_expression(&self, expr: &str) -> Result<String, CalculatorError> {
        let mut prepared = expr.trim().to_string();

        prepared = prepared.replace("arcsin", "asin");
        prepared = prepared.replace("arccos", "acos");
        prepared = prepared.replace("arctan", "atan");
        prepared = prepared.replace("arcsinh", "asinh");
        prepared = prepared.replace("arccosh", "acosh");
        prepared = prepared.replace("arctanh", "atanh");
        prepared = prepared.replace("cosec", "csc");

        // log(x) is base 10; log2(x) is base 2. Rewrite before the ln
        // function-name conversion below so the inserted `ln` gets prefixed.
        prepared = self.replace_log_base(&prepared, "log(", "math::ln(10)");
        prepared = self.replace_log_base(&prepared, "log2(", "math::ln(2)");

        prepared = self.rewrite_function(&prepared, "csc", "1/math::sin");
        prepared = self.rewrite_function(&prepared, "sec", "1/math::cos");
        prepared = self.rewrite_function(&prepared, "cot", "1/math::tan");
        prepared = self.rewrite_function(&prepared, "csch", "1/math::sinh");
        prepared = self.rewrite_function(&prepared, "sech", "1/math::cosh");
        prepared = self.rewrite_function(&prepared, "coth", "1/math::tanh");

        prepared = self.convert_to_evalexpr_functions(&prepared);
        prepared = prepared.replace("**", "^");
        prepared = self.replace_constant(&prepared, "pi", "math::PI");
        prepared = self.replace_constant(&prepared, "e", "math::E");

        Ok(prepared)
    }

    fn replace_constant(&self, expr: &str, constant: &str, replacement: &str) -> String {
        let chars: Vec<char> = expr.chars().collect();
        let constant_chars: Vec<char> = constant.chars().collect();
        let constant_len = constant_chars.len();
        let mut result = String::new();
        let mut i = 0;
        while i < chars.len() {
            if i + constant_len <= chars.len() {
                let substring: String = chars[i..i + constant_len].iter().collect();
                if substring == constant {
                    let before = i > 0 && chars[i - 1].is_alphanumeric();
                    let after = i + constant_len < chars.len() && chars[i + constant_len].is_alphanumeric();
                    if !before && !after {
                        result.push_str(replacement);
                        i += constant_len;
                        continue;
                    }
                }
            }
            result.push(chars[i]);
            i += 1;
        }
        result
    }

    fn convert_to_evalexpr_functions(&self, expr: &str) -> String {
        let functions = [
            ("atan2", "math::atan2"),
            ("sinh", "math::sinh"),
            ("cosh", "math::cosh"),
            ("tanh", "math::tanh"),
            ("asin", "math::asin"),
            ("acos", "math::acos"),
            ("atan", "math::atan"),
            ("sqrt", "math::sqrt"),
            ("abs", "math::abs"),
            ("ln", "math::ln"),
            ("exp", "math::exp"),
            ("sin", "math::sin"),
            ("cos", "math::cos"),
            ("tan", "math::tan"),
        ];

        let mut result = expr.to_string();
        for (func_name, math_func) in functions {
            let chars: Vec<char> = result.chars().collect();
            let mut new_result = String::new();
            let mut i = 0;
            while i < chars.len() {
                if i + func_name.len() <= chars.len() {
                    let substring: String = chars[i..i + func_name.len()].iter().collect();
                    let already_prefixed = i >= 6 && chars[i - 6..i].iter().collect::<String>() == "math::";
                    if substring == func_name && !already_prefixed {
                        let word_boundary_before = i == 0 || !chars[i - 1].is_alphanumeric();
                        let mut j = i + func_name.len();
                        while j < chars.len() && chars[j].is_whitespace() {
                            j += 1;
                        }
                        if word_boundary_before && j < chars.len() && chars[j] == '(' {
                            new_result.push_str(math_func);
                            i += func_name.len();
                            continue;
                        }
                    }
                }
                new_result.push(chars[i]);
                i += 1;
            }
            result = new_result;
        }
        result
    }

    fn rewrite_function(&self, expr: &str, func_name: &str, replacement: &str) -> String {
        let pattern = format!("{func_name}(");
        if !expr.contains(&pattern) {
            return expr.to_string();
        }
        let mut result = String::new();
        let mut chars = expr.chars().peekable();
        let search_bytes = pattern.as_bytes();
        while let Some(ch) = chars.next() {
            if ch as u8 == search_bytes[0] {
                let mut temp_chars = chars.clone();
                let mut matched = true;
                for &byte in &search_bytes[1..] {
                    if let Some(next_ch) = temp_chars.next() {
                        if next_ch as u8 != byte {
                            matched = false;
                            break;
                        }
                    } else {
                        matched = false;
                        break;
                    }
                }
                if matched {
                    result.push_str(replacement);
                    result.push('(');
                    for _ in 1..search_bytes.len() {
                        chars.next();
                    }
                } else {
                    result.push(ch);
                }
            } else {
                result.push(ch);
            }
        }
        result
    }

    /// Rewrite `prefix` (`"log("` or `"log2("`) to `ln(arg)/ln_base`. The two
    /// prefixes never collide: `"log("` requires `(` right after `log`,
    /// which `"log2("` doesn't have, so calling this for `"log("` first is
    /// safe even when the expression also contains `log2(`.
    fn replace_log_base(&self, expr: &str, prefix: &str, ln_base: &str) -> String {
        if !expr.contains(prefix) {
            return expr.to_string();
        }

        let mut result = String::new();
        let mut rest = expr;
        while let Some(idx) = rest.find(prefix) {
            result.push_str(&rest[..idx]);
            let (arg, remainder) = Self::take_balanced(&rest[idx + prefix.len()..]);
            result.push_str("math::ln(");
            result.push_str(&arg);
            result.push_str(")/");
            result.push_str(ln_base);
            rest = remainder;
        }
        result.push_str(rest);
        result
    }

    /// Consume characters up to the matching closing paren, returning the
    /// content and what remains after it.
    fn take_balanced(input: &str) -> (String, &str) {
        let mut depth = 1;
        for (byte_idx, ch) in input.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return (input[..byte_idx].to_string(), &input[byte_idx + 1..]);
                    }
                }
                _ => {}
            }
        }
        (input.to_string(), "")
    }

    fn try_statistical_function(&self, expression: &str) -> CalculatorResult {
        let expr = expression.trim();
        if !expr.contains('[') && !expr.contains('(') {
            return Err(CalculatorError::new("not a statistical function"));
        }
        let paren_idx = expr.find('(').ok_or_else(|| CalculatorError::new("not a statistical function"))?;
        let func_name = expr[..paren_idx].trim().to_lowercase();
        let args_end = expr.rfind(')').ok_or_else(|| CalculatorError::new("missing closing parenthesis"))?;
        let args = expr[paren_idx + 1..args_end].trim();

        match func_name.as_str() {
            "mean" => self.stat_mean(args),
            "median" => self.stat_median(args),
            "mode" => self.stat_mode(args),
            "std" => self.stat_std(args),
            "stdpop" => self.stat_stdpop(args),
            "var" => self.stat_var(args),
            "varpop" => self.stat_varpop(args),
            "sum" => self.stat_sum(args),
            "count" => self.stat_count(args),
            "min" => self.stat_min(args),
            "max" => self.stat_max(args),
            _ => Err(CalculatorError::new("not a known statistical function")),
        }
    }

    fn parse_array(&self, arg: &str) -> Result<Vec<f64>, CalculatorError> {
        let arg = arg.trim();
        let content = if (arg.starts_with('[') && arg.ends_with(']')) || (arg.starts_with('(') && arg.ends_with(')')) {
            &arg[1..arg.len() - 1]
        } else {
            arg
        };
        if content.trim().is_empty() {
            return Err(CalculatorError::new("empty array"));
        }
        content
            .split(',')
            .map(|s| s.trim().parse::<f64>().map_err(|_| CalculatorError::new(format!("invalid number in array: {s}"))))
            .collect()
    }

    fn stat_mean(&self, arg: &str) -> CalculatorResult {
        let values = self.parse_array(arg)?;
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn stat_median(&self, arg: &str) -> CalculatorResult {
        let mut values = self.parse_array(arg)?;
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = values.len();
        if n % 2 == 1 {
            Ok(values[n / 2])
        } else {
            Ok((values[n / 2 - 1] + values[n / 2]) / 2.0)
        }
    }

    fn stat_mode(&self, arg: &str) -> CalculatorResult {
        let values = self.parse_array(arg)?;
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for v in &values {
            *frequencies.entry(v.to_string()).or_insert(0) += 1;
        }
        let (mode_str, _) = frequencies
            .iter()
            .max_by_key(|&(_, count)| count)
            .ok_or_else(|| CalculatorError::new("empty array"))?;
        mode_str.parse::<f64>().map_err(|_| CalculatorError::new("could not parse mode value"))
    }

    fn stat_std(&self, arg: &str) -> CalculatorResult {
        self.stat_var(arg).map(f64::sqrt)
    }

    fn stat_stdpop(&self, arg: &str) -> CalculatorResult {
        self.stat_varpop(arg).map(f64::sqrt)
    }

    fn stat_var(&self, arg: &str) -> CalculatorResult {
        let values = self.parse_array(arg)?;
        if values.len() < 2 {
            return Err(CalculatorError::new("variance requires at least 2 values"));
        }
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        Ok(values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
    }

    fn stat_varpop(&self, arg: &str) -> CalculatorResult {
        let values = self.parse_array(arg)?;
        if values.is_empty() {
            return Err(CalculatorError::new("empty array"));
        }
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        Ok(values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64)
    }

    fn stat_sum(&self, arg: &str) -> CalculatorResult {
        Ok(self.parse_array(arg)?.iter().sum())
    }

    fn stat_count(&self, arg: &str) -> CalculatorResult {
        Ok(self.parse_array(arg)?.len() as f64)
    }

    fn stat_min(&self, arg: &str) -> CalculatorResult {
        Ok(self.parse_array(arg)?.iter().copied().fold(f64::INFINITY, f64::min))
    }

    fn stat_max(&self, arg: &str) -> CalculatorResult {
        Ok(self.parse_array(arg)?.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }
}

#[derive(Deserialize)]
struct CalculatorArgs {
    expression: String,
}

pub struct CalculatorTool {
    calculator: Calculator,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self { calculator: Calculator::new() }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "calculator".into(),
            description: "Evaluates a mathematical expression and returns the numeric result.".into(),
            parameters: vec![ToolParameter {
                name: "expression".into(),
                description: "The expression to evaluate, e.g. 'sqrt(16) + mean([1,2,3])'.".into(),
                parameter_type: ParameterType::String,
                required: true,
            }],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: CalculatorArgs = serde_json::from_value(arguments)?;
        let result = self
            .calculator
            .evaluate(&args.expression)
            .await
            .map_err(|e| VoxError::ToolFailed("calculator".into(), e.to_string()))?;
        Ok(serde_json::json!({ "result": result }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn eval(expr: &str) -> f64 {
        Calculator::new().evaluate(expr).await.unwrap()
    }

    #[tokio::test]
    async fn basic_arithmetic() {
        assert_eq!(eval("2 + 2 * 3").await, 8.0);
        assert_eq!(eval("2**3").await, 8.0);
    }

    #[tokio::test]
    async fn trigonometry_in_radians() {
        assert!((eval("sin(pi/2)").await - 1.0).abs() < 1e-9);
        assert!((eval("cos(pi)").await + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reciprocal_trig_functions() {
        let expected = 1.0 / (1.0f64).sin();
        assert!((eval("csc(1)").await - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn log_base_10_and_2() {
        assert!((eval("log(100)").await - 2.0).abs() < 1e-9);
        assert!((eval("log2(8)").await - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn statistics() {
        assert_eq!(eval("mean([1, 2, 3, 4, 5])").await, 3.0);
        assert_eq!(eval("sum([1, 2, 3])").await, 6.0);
        assert_eq!(eval("median([1, 2, 3, 4])").await, 2.5);
    }

    #[tokio::test]
    async fn empty_array_is_an_error() {
        assert!(Calculator::new().evaluate("mean([])").await.is_err());
    }

    #[tokio::test]
    async fn tool_handler_dispatches_through_the_registry() {
        let tool = CalculatorTool::new();
        let result = tool.call(serde_json::json!({"expression": "3 + 4"})).await.unwrap();
        assert_eq!(result["result"], 7.0);
    }
}
