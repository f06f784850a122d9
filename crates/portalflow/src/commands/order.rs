use crate::{Context, OrderCommands, TolerateArg};
use anyhow::Context as _;
use colored::{ColoredString, Colorize};
use portalflow_order::{
    ActionRequest, ActionStatus, CreateOrderRequest, Item, ItemTree, Order, OrderStatus,
    SettleReport,
};
use std::time::Duration;

pub async fn handle(ctx: &Context, command: OrderCommands) -> anyhow::Result<()> {
    match command {
        OrderCommands::Show { id } => show(ctx, &id).await,
        OrderCommands::Wait { id, timeout } => wait(ctx, &id, timeout).await,
        OrderCommands::Action {
            id,
            name,
            item,
            attrs,
            tolerate,
        } => action(ctx, &id, &name, item, attrs.as_deref(), tolerate).await,
        OrderCommands::Output { id, action_id } => output(ctx, &id, &action_id).await,
        OrderCommands::Create {
            label,
            product_id,
            attrs,
            lifetime,
        } => create(ctx, &label, &product_id, attrs.as_deref(), lifetime).await,
    }
}

async fn load(ctx: &Context, id: &str) -> anyhow::Result<Order> {
    Order::load(ctx.service.clone(), id)
        .await
        .with_context(|| format!("Failed to load order {}", id))
}

async fn show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let order = load(ctx, id).await?;
    print_order(&order);
    Ok(())
}

async fn wait(ctx: &Context, id: &str, timeout: Option<u64>) -> anyhow::Result<()> {
    let mut order = load(ctx, id).await?;
    let policy = match timeout {
        Some(secs) => ctx.policy.clone().with_timeout(Duration::from_secs(secs)),
        None => ctx.policy.clone(),
    };

    println!("{}", format!("Waiting for order {}...", id).blue());
    let report = order.wait_until_settled(&policy).await?;
    print_settled(&order, &report);
    Ok(())
}

async fn action(
    ctx: &Context,
    id: &str,
    name: &str,
    item: Option<String>,
    attrs: Option<&str>,
    tolerate: Option<TolerateArg>,
) -> anyhow::Result<()> {
    let mut order = load(ctx, id).await?;
    let item_id = match item {
        Some(item_id) => item_id,
        None => order.items().root()?.id.clone(),
    };

    let mut request = ActionRequest::new(name, item_id).with_attrs(parse_attrs(attrs)?);
    if let Some(tolerate) = tolerate {
        request = request.tolerate(tolerate.into());
    }

    println!(
        "{}",
        format!("Running {} on order {} (item {})...", name, id, request.item_id).blue()
    );
    let report = order.perform(&request, &ctx.policy).await?;
    print_settled(&order, &report);
    Ok(())
}

async fn output(ctx: &Context, id: &str, action_id: &str) -> anyhow::Result<()> {
    let output = ctx
        .service
        .action_output(id, action_id)
        .await
        .with_context(|| format!("Failed to fetch output of action {}", action_id))?;

    if output.trim().is_empty() {
        println!("{}", "(no output)".dimmed());
    } else {
        println!("{}", output);
    }
    Ok(())
}

async fn create(
    ctx: &Context,
    label: &str,
    product_id: &str,
    attrs: Option<&str>,
    lifetime: Option<u32>,
) -> anyhow::Result<()> {
    let financial_project_id = ctx.config.require_financial_project()?;

    let mut request = CreateOrderRequest::new(label, product_id, financial_project_id)
        .with_attrs(parse_attrs(attrs)?);
    if let Some(days) = lifetime {
        request = request.with_lifetime(days);
    }

    println!(
        "{}",
        format!("Ordering {} as '{}'...", product_id, label).blue()
    );
    let order = Order::provision(ctx.service.clone(), &request, &ctx.policy).await?;

    println!("{} Order {} provisioned", "✓".green().bold(), order.id().cyan());
    print_order(&order);
    Ok(())
}

/// Parse `--attrs`; only JSON objects are accepted.
fn parse_attrs(raw: Option<&str>) -> anyhow::Result<serde_json::Value> {
    let Some(raw) = raw else {
        return Ok(serde_json::Value::Null);
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--attrs is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--attrs must be a JSON object, got {}", raw);
    }
    Ok(value)
}

fn colored_status(status: OrderStatus) -> ColoredString {
    let text = status.to_string();
    if status.is_success() {
        text.green()
    } else if status.is_settling() {
        text.yellow()
    } else {
        text.red()
    }
}

fn colored_action(status: &ActionStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        ActionStatus::Success => text.green(),
        ActionStatus::Warning => text.yellow(),
        ActionStatus::Failed(_) => text.red(),
        _ => text.dimmed(),
    }
}

fn print_order(order: &Order) {
    println!();
    println!("{} {}", "Order:".bold(), order.id().cyan());
    println!("  status:      {}", colored_status(order.status()));
    match order.last_action() {
        Some(action) => println!(
            "  last action: {} ({})",
            action.id,
            colored_action(&action.status)
        ),
        None => println!("  last action: {}", "none".dimmed()),
    }

    println!();
    if order.items().is_empty() {
        println!("{}", "No items yet".dimmed());
        return;
    }
    println!("{}", "Items:".bold());
    for line in tree_lines(order.items()) {
        println!("  {}", line);
    }
}

fn print_settled(order: &Order, report: &SettleReport) {
    let summary = format!(
        "Order {} settled as {} after {} poll(s) in {}s",
        order.id(),
        order.status(),
        report.polls,
        report.elapsed.as_secs()
    );

    if report.tolerated {
        let status = report
            .action_status
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("{} {} (action ended as {})", "⚠".yellow().bold(), summary, status);
    } else {
        println!("{} {}", "✓".green().bold(), summary);
    }
}

/// Item tree as indented lines, roots first, children in portal order.
/// Items whose parent is missing from the order follow at the top level.
fn tree_lines(items: &ItemTree) -> Vec<String> {
    fn walk(items: &ItemTree, item: &Item, depth: usize, lines: &mut Vec<String>) {
        let state = item
            .state
            .as_ref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default();
        lines.push(format!(
            "{}{} [{}]{}",
            "  ".repeat(depth),
            item.id,
            item.kind,
            state
        ));
        for child in items.children(&item.id) {
            walk(items, child, depth + 1, lines);
        }
    }

    let mut lines = Vec::with_capacity(items.len());
    for root in items.iter().filter(|item| item.is_root()) {
        walk(items, root, 0, &mut lines);
    }
    let orphans = items.iter().filter(|item| {
        item.parent_id
            .as_deref()
            .is_some_and(|parent| items.get(parent).is_none())
    });
    for orphan in orphans {
        walk(items, orphan, 0, &mut lines);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use portalflow_order::RawItem;
    use serde_json::json;

    #[test]
    fn test_parse_attrs() {
        assert_eq!(parse_attrs(None).unwrap(), serde_json::Value::Null);
        assert_eq!(
            parse_attrs(Some(r#"{"max_size_gb": 20}"#)).unwrap(),
            json!({"max_size_gb": 20})
        );
        assert!(parse_attrs(Some("[1, 2]")).is_err());
        assert!(parse_attrs(Some("{not json")).is_err());
    }

    #[test]
    fn test_tree_lines() {
        let raw: Vec<RawItem> = serde_json::from_value(json!([
            {"item_id": "root", "type": "cluster", "parent": "", "data": {"state": "on"}},
            {"item_id": "n1", "type": "vm", "parent": "root", "data": {"state": "off"}},
            {"item_id": "disk", "type": "volume", "parent": "n1"}
        ]))
        .unwrap();
        let items = ItemTree::from_raw(raw).unwrap();

        assert_eq!(
            tree_lines(&items),
            vec!["root [cluster] on", "  n1 [vm] off", "    disk [volume]"]
        );
    }

    #[test]
    fn test_tree_lines_keeps_orphans() {
        let raw: Vec<RawItem> = serde_json::from_value(json!([
            {"item_id": "root", "type": "cluster", "parent": ""},
            {"item_id": "lost", "type": "vm", "parent": "gone"},
            {"item_id": "disk", "type": "volume", "parent": "lost"}
        ]))
        .unwrap();
        let items = ItemTree::from_raw(raw).unwrap();

        assert_eq!(
            tree_lines(&items),
            vec!["root [cluster]", "lost [vm]", "  disk [volume]"]
        );
    }
}
