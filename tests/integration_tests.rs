//! Integration tests for the Auto Advisor MCP Server
//!
//! These tests drive the tool dispatcher and the JSON-RPC layer against small
//! CSV fixtures written to temporary files.

use std::io::Write;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

use auto_advisor_mcp::mcp::tools::ToolHandler;
use auto_advisor_mcp::mcp::types::CallToolResult;

const HEADER: &str = "Car Make,Car Model,Year,Mileage,Price,Fuel Type,Color,Transmission,Options/Features,Condition,Accident";

/// Two-row table from the usage example
fn example_rows() -> Vec<&'static str> {
    vec![
        "Toyota,Corolla,2018,42000,12000,Gasoline,Red,Automatic,GPS,Used,No",
        "Honda,Civic,2016,78000,9000,Gasoline,Blue,Manual,,Used,No",
    ]
}

/// A wider table for ordering and estimation checks
fn market_rows() -> Vec<String> {
    let makes = [("Toyota", "Corolla", "Gasoline"), ("Kia", "Rio", "Diesel"), ("Tesla", "Model 3", "Electric")];
    let mut rows = Vec::new();
    for (i, year) in (2012i64..=2023).enumerate() {
        for (k, (make, model, fuel)) in makes.iter().enumerate() {
            let mileage = 10_000 + ((i * 7 + k * 3) % 12) as i64 * 11_000;
            let price = 6_000 + (year - 2012) * 1_400 + k as i64 * 3_000 - mileage / 40;
            let transmission = if (i + k) % 2 == 0 { "Automatic" } else { "Manual" };
            let accident = if (i + k) % 5 == 0 { "Yes" } else { "No" };
            rows.push(format!(
                "{make},{model},{year},{mileage},{price},{fuel},Gray,{transmission},,Used,{accident}"
            ));
        }
    }
    // Dropped during cleaning
    rows.push("Ford,Focus,2005,50000,3000,Gasoline,Red,Manual,,Used,No".to_string());
    rows.push("Ford,Focus,2015,50000,,Gasoline,Red,Manual,,Used,No".to_string());
    rows
}

fn write_table<S: AsRef<str>>(rows: &[S]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row.as_ref()).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Parse the JSON payload carried in a tool result
fn payload(result: &CallToolResult) -> Value {
    serde_json::from_str(result.first_text().expect("text content")).expect("JSON payload")
}

async fn call(handler: &ToolHandler, name: &str, args: Value) -> (Value, bool) {
    let result = handler.call_tool(name, args).await.expect("tool call");
    (payload(&result), result.is_error)
}

mod example_scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_filter_cars_orders_by_price() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(
            &handler,
            "filter_cars",
            json!({"FuelType": "Gasoline", "Year_min": 2015, "limit": 2}),
        )
        .await;

        assert!(!is_error);
        assert_eq!(out["count"], 2);
        assert_eq!(out["results"][0]["Make"], "Honda");
        assert_eq!(out["results"][0]["Price"], 9000.0);
        assert_eq!(out["results"][1]["Make"], "Toyota");
        assert_eq!(out["results"][1]["Color"], "Red");
    }

    #[tokio::test]
    async fn test_filter_cars_accepts_whole_number_floats() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "filter_cars", json!({"Year_min": 2015.0, "limit": 2.0})).await;

        assert!(!is_error);
        assert_eq!(out["count"], 2);
        assert_eq!(out["results"][0]["Make"], "Honda");
    }

    #[tokio::test]
    async fn test_filter_cars_rejects_fractional_year() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "filter_cars", json!({"Year_min": 2015.5})).await;

        assert!(is_error);
        assert!(out["error"].as_str().unwrap().contains("expected an integer"));
        assert_eq!(out["args"], json!({"Year_min": 2015.5}));
    }

    #[tokio::test]
    async fn test_recommend_within_budget() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "recommend", json!({"budget_max": 10000})).await;

        assert!(!is_error);
        assert_eq!(out["budget_max"], 10000.0);
        assert_eq!(out["count"], 1);
        assert_eq!(out["recommendations"][0]["Make"], "Honda");
        assert!(out["recommendations"][0].get("Color").is_none());
    }

    #[tokio::test]
    async fn test_average_price_without_matches() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "average_price", json!({"Make": "Ford"})).await;

        assert!(!is_error);
        assert_eq!(out["filters"], json!({"Make": "Ford"}));
        assert!(out["average_price"].is_null());
        assert_eq!(out["samples"], 0);
    }

    #[tokio::test]
    async fn test_average_price_with_matches() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, _) = call(&handler, "average_price", json!({"FuelType": "gasoline"})).await;

        assert_eq!(out["average_price"], 10500.0);
        assert_eq!(out["samples"], 2);
    }
}

mod ordering_tests {
    use super::*;

    fn prices(rows: &Value) -> Vec<f64> {
        rows.as_array()
            .unwrap()
            .iter()
            .map(|r| r["Price"].as_f64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_filter_cars_default_limit() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (out, _) = call(&handler, "filter_cars", json!({})).await;

        assert_eq!(out["count"], 20);
        assert_eq!(out["results"].as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_filter_cars_small_dataset_returns_everything() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, _) = call(&handler, "filter_cars", Value::Null).await;

        assert_eq!(out["count"], 2);
    }

    #[tokio::test]
    async fn test_filter_and_recommend_sort_order() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        for (name, args, key) in [
            ("filter_cars", json!({"limit": 100}), "results"),
            ("recommend", json!({"budget_max": 30000, "limit": 100}), "recommendations"),
        ] {
            let (out, _) = call(&handler, name, args).await;
            let rows = out[key].as_array().unwrap();
            for pair in rows.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let (pa, pb) = (a["Price"].as_f64().unwrap(), b["Price"].as_f64().unwrap());
                assert!(pa <= pb, "{name}: prices out of order");
                if pa == pb {
                    assert!(a["Year"].as_i64().unwrap() >= b["Year"].as_i64().unwrap());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_recommend_respects_filters() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (out, _) = call(
            &handler,
            "recommend",
            json!({"budget_max": 25000, "Accident": "No", "Year_min": 2016, "limit": 50}),
        )
        .await;

        let rows = out["recommendations"].as_array().unwrap();
        assert!(!rows.is_empty());
        assert_eq!(out["count"], rows.len());
        for row in rows {
            assert!(row["Price"].as_f64().unwrap() <= 25000.0);
            assert!(row["Year"].as_i64().unwrap() >= 2016);
            assert_eq!(row["Accident"], "No");
        }
    }

    #[tokio::test]
    async fn test_top_cars_directions() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (cheap, _) = call(&handler, "top_cars", json!({})).await;
        assert_eq!(cheap["order"], "cheap");
        let cheap_prices = prices(&cheap["results"]);
        assert_eq!(cheap_prices.len(), 10);
        assert!(cheap_prices.windows(2).all(|w| w[0] <= w[1]));

        let (expensive, _) = call(
            &handler,
            "top_cars",
            json!({"sort_order": "expensive", "n": 5, "Make": "tesla"}),
        )
        .await;
        assert_eq!(expensive["order"], "expensive");
        let expensive_prices = prices(&expensive["results"]);
        assert_eq!(expensive_prices.len(), 5);
        assert!(expensive_prices.windows(2).all(|w| w[0] >= w[1]));
        for row in expensive["results"].as_array().unwrap() {
            assert_eq!(row["Make"], "Tesla");
        }
    }

    #[tokio::test]
    async fn test_cleaning_drops_invalid_rows() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (out, _) = call(&handler, "average_price", json!({"Make": "Ford"})).await;
        assert_eq!(out["samples"], 0);

        let context = handler.context().await.unwrap();
        assert_eq!(context.dataset().len(), 36);
    }
}

mod estimate_price_tests {
    use super::*;

    fn query() -> Value {
        json!({
            "Make": "Toyota",
            "Model": "Corolla",
            "Year": 2019,
            "Mileage": 40000,
            "FuelType": "Gasoline",
            "Transmission": "Automatic"
        })
    }

    #[tokio::test]
    async fn test_estimate_price_echoes_normalized_input() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "estimate_price", query()).await;

        assert!(!is_error);
        assert_eq!(out["input"]["Condition"], "Used");
        assert_eq!(out["input"]["Accident"], "No");
        assert_eq!(out["input"]["Year"], 2019);
        assert_eq!(out["input"]["Mileage"], 40000.0);
        let price = out["estimated_price"].as_f64().unwrap();
        assert!(price.is_finite());
        assert!(price > 0.0);
    }

    #[tokio::test]
    async fn test_estimate_price_is_deterministic() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let (first, _) = call(&handler, "estimate_price", query()).await;
        let (second, _) = call(&handler, "estimate_price", query()).await;
        assert_eq!(first["estimated_price"], second["estimated_price"]);
    }

    #[tokio::test]
    async fn test_estimate_price_unseen_categories() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let args = json!({
            "Make": "Lada",
            "Model": "Niva",
            "Year": 2018,
            "Mileage": 60000,
            "FuelType": "Hydrogen",
            "Transmission": "CVT",
            "Condition": "Salvage",
            "Accident": "Yes"
        });
        let (out, is_error) = call(&handler, "estimate_price", args.clone()).await;
        assert!(!is_error);
        let price = out["estimated_price"].as_f64().unwrap();
        assert!(price.is_finite());
        assert!(price.abs() < 1_000_000.0);

        let (again, _) = call(&handler, "estimate_price", args).await;
        assert_eq!(out["estimated_price"], again["estimated_price"]);
    }

    #[tokio::test]
    async fn test_estimate_price_accepts_whole_number_year() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let mut args = query();
        args["Year"] = json!(2018.0);
        let (out, is_error) = call(&handler, "estimate_price", args).await;

        assert!(!is_error);
        assert_eq!(out["input"]["Year"], 2018);
        assert!(out["estimated_price"].as_f64().unwrap().is_finite());
    }

    #[tokio::test]
    async fn test_estimate_price_missing_year() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());

        let args = json!({"Mileage": 40000, "FuelType": "Gasoline", "Transmission": "Manual"});
        let (out, is_error) = call(&handler, "estimate_price", args.clone()).await;

        assert!(is_error);
        assert!(out["error"].as_str().unwrap().contains("Year"));
        assert_eq!(out["args"], args);
    }
}

mod dispatcher_tests {
    use super::*;
    use std::sync::Arc;

    use auto_advisor_mcp::cars::dataset::Dataset;
    use auto_advisor_mcp::cars::types::VehicleRecord;
    use auto_advisor_mcp::mcp::context::AdvisorContext;

    fn vehicle(make: &str, model: &str, year: i32, mileage: f64, price: f64) -> VehicleRecord {
        VehicleRecord {
            make: make.to_string(),
            model: model.to_string(),
            year,
            mileage,
            price,
            fuel_type: "Gasoline".to_string(),
            color: "Red".to_string(),
            transmission: "Automatic".to_string(),
            options: String::new(),
            condition: "Used".to_string(),
            accident: "No".to_string(),
        }
    }

    #[tokio::test]
    async fn test_prebuilt_context_serves_without_a_file() {
        let dataset = Dataset::from_records(vec![
            vehicle("Toyota", "Corolla", 2018, 42_000.0, 12_000.0),
            vehicle("Honda", "Civic", 2016, 78_000.0, 9_000.0),
        ]);
        let context = AdvisorContext::from_dataset(dataset).unwrap();
        let handler = ToolHandler::with_context(context);
        assert!(handler.is_initialized());

        let (filtered, is_error) = call(&handler, "filter_cars", json!({"Year_min": 2017})).await;
        assert!(!is_error);
        assert_eq!(filtered["count"], 1);
        assert_eq!(filtered["results"][0]["Make"], "Toyota");

        let (recommended, _) = call(&handler, "recommend", json!({"budget_max": 10000})).await;
        assert_eq!(recommended["count"], 1);
        assert_eq!(recommended["recommendations"][0]["Model"], "Civic");

        let (average, _) = call(&handler, "average_price", json!({})).await;
        assert_eq!(average["average_price"], 10500.0);
        assert_eq!(average["samples"], 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_initialize() {
        let handler = ToolHandler::new("/definitely/not/here.csv");

        let (out, is_error) = call(&handler, "sell_car", json!({"price": 1})).await;

        assert!(is_error);
        assert_eq!(out, json!({"error": "Unknown tool: sell_car"}));
        assert!(!handler.is_initialized());
    }

    #[tokio::test]
    async fn test_recommend_without_budget_is_error_payload() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let args = json!({"Make": "Honda"});
        let (out, is_error) = call(&handler, "recommend", args.clone()).await;

        assert!(is_error);
        assert!(out["error"].as_str().unwrap().contains("budget_max"));
        assert_eq!(out["args"], args);
    }

    #[tokio::test]
    async fn test_unexpected_and_mistyped_arguments() {
        let table = write_table(&example_rows());
        let handler = ToolHandler::new(table.path());

        let (out, is_error) = call(&handler, "filter_cars", json!({"Colour": "Red"})).await;
        assert!(is_error);
        assert!(out["error"].as_str().unwrap().contains("Colour"));

        let (_, is_error) = call(&handler, "top_cars", json!({"sort_order": "random"})).await;
        assert!(is_error);

        let (_, is_error) = call(&handler, "filter_cars", json!({"Accident": "maybe"})).await;
        assert!(is_error);

        let (_, is_error) = call(&handler, "filter_cars", json!({"limit": -1})).await;
        assert!(is_error);
    }

    #[tokio::test]
    async fn test_missing_columns_surface_and_retry() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Car Make,Year,Price").unwrap();
        writeln!(file, "Toyota,2018,12000").unwrap();
        file.flush().unwrap();

        let handler = ToolHandler::new(file.path());
        let err = handler.call_tool("filter_cars", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Missing columns"));
        assert!(!handler.is_initialized());

        let err = handler.call_tool("filter_cars", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Mileage"));
    }

    #[tokio::test]
    async fn test_lazy_initialization_happens_once() {
        let table = write_table(&market_rows());
        let handler = ToolHandler::new(table.path());
        assert!(!handler.is_initialized());

        call(&handler, "filter_cars", json!({})).await;
        let first = handler.context().await.unwrap();
        let size = first.dataset().len();
        let coefficients = first.model().coefficients().to_vec();

        call(&handler, "top_cars", json!({})).await;
        let second = handler.context().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.dataset().len(), size);
        assert_eq!(second.model().coefficients(), coefficients.as_slice());
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_context() {
        let table = write_table(&market_rows());
        let handler = Arc::new(ToolHandler::new(table.path()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.context().await.unwrap() })
            })
            .collect();

        let mut contexts = Vec::new();
        for task in tasks {
            contexts.push(task.await.unwrap());
        }
        assert!(contexts.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}

mod mcp_protocol_tests {
    use super::*;
    use auto_advisor_mcp::mcp::server::McpServer;

    fn request(id: i64, method: &str, params: Option<Value>) -> String {
        let mut request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(p) = params {
            request["params"] = p;
        }
        request.to_string()
    }

    #[tokio::test]
    async fn test_initialize_and_list_tools() {
        let mut server = McpServer::new(ToolHandler::new("/definitely/not/here.csv"));

        let init = server
            .handle_message(&request(1, "initialize", Some(json!({}))))
            .await
            .unwrap()
            .unwrap();
        let result = init.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "auto_advisor");
        assert!(result["capabilities"]["tools"].is_object());

        let list = server
            .handle_message(&request(2, "tools/list", None))
            .await
            .unwrap()
            .unwrap();
        let tools = list.result.unwrap()["tools"].as_array().unwrap().clone();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec!["filter_cars", "recommend", "estimate_price", "average_price", "top_cars"]
        );
        assert!(tools.iter().all(|t| t["inputSchema"]["additionalProperties"] == false));
        assert!(!server.tool_handler().is_initialized());
    }

    #[tokio::test]
    async fn test_call_tool_round_trip() {
        let table = write_table(&example_rows());
        let mut server = McpServer::new(ToolHandler::new(table.path()));

        let response = server
            .handle_message(&request(
                3,
                "tools/call",
                Some(json!({"name": "top_cars", "arguments": {"n": 1}})),
            ))
            .await
            .unwrap()
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap();
        let out: Value = serde_json::from_str(text).unwrap();
        assert_eq!(out["results"][0]["Make"], "Honda");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_initialization_failure_is_internal_error() {
        let mut server = McpServer::new(ToolHandler::new("/definitely/not/here.csv"));

        let response = server
            .handle_message(&request(
                4,
                "tools/call",
                Some(json!({"name": "filter_cars", "arguments": {}})),
            ))
            .await
            .unwrap()
            .unwrap();

        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32603);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut server = McpServer::new(ToolHandler::new("/definitely/not/here.csv"));
        let response = server
            .handle_message(&request(5, "resources/list", None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
