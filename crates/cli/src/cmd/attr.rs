//! Implementation of the `pkgload attr` command.
//!
//! Shows a rule attribute as stored, and for configurable list attributes the
//! union of every `select()` branch.

use anyhow::{Context, Result, anyhow};
use pkgload_lib::attrs::{AttrType, Value};
use pkgload_lib::attrs::types::{LabelListType, OutputListType, StringListType};
use pkgload_lib::{Label, PackageCache};

use crate::output::{format_attribute_value, format_value, print_json, print_stat};

pub async fn cmd_attr(cache: &PackageCache, label: &str, attribute: &str, json: bool) -> Result<()> {
  let label = Label::parse(label).with_context(|| format!("Invalid label: {}", label))?;
  let target = cache.get_target(&label).await?;
  let rule = target
    .as_rule()
    .ok_or_else(|| anyhow!("{} is a {}, not a rule", label, target.kind_name()))?;
  let attr = rule
    .attribute(attribute)
    .ok_or_else(|| anyhow!("no such attribute '{}' in '{}' rule", attribute, rule.kind()))?;

  let mapper = rule.mapper();
  let merged = match attr.ty() {
    AttrType::StringList => Some(Value::StringList(mapper.merged_values::<StringListType>(attribute)?)),
    AttrType::LabelList => Some(Value::LabelList(mapper.merged_values::<LabelListType>(attribute)?)),
    AttrType::OutputList => Some(Value::OutputList(mapper.merged_values::<OutputListType>(attribute)?)),
    _ => None,
  };
  let stored = attr.value().map(format_attribute_value);

  if json {
    print_json(&serde_json::json!({
      "label": label.to_string(),
      "attribute": attribute,
      "type": attr.ty().name(),
      "explicit": attr.is_explicit(),
      "configurable": mapper.is_configurable(attribute),
      "value": stored,
      "merged": merged.as_ref().map(format_value),
    }))?;
    return Ok(());
  }

  print_stat("Type", attr.ty().name());
  print_stat("Value", stored.as_deref().unwrap_or("None"));
  if mapper.is_configurable(attribute) {
    let keys: Vec<_> = mapper.configurability_keys(attribute).iter().map(ToString::to_string).collect();
    print_stat("Conditions", &keys.join(", "));
    if let Some(merged) = &merged {
      print_stat("All branches", &format_value(merged));
    }
  }
  Ok(())
}
