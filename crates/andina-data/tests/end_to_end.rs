//! Directory exports through loading, processing and view building.

use std::fs;
use std::path::Path;

use andina_data::core::models::{TableKey, Value};
use andina_data::core::settings::ViewName;
use andina_data::views::{build_views, ViewOptions, ViewReport, ViewUnavailable};
use andina_data::{process, DataSource, DirectorySource};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn seed(dir: &Path) {
    write(
        dir,
        "ventas_andina.csv",
        "venta_id,fecha,producto_id,cliente_id,cantidad,subtotal_cop,margen_total_cop,categoria,region\n\
         1,2024-01-15,P1,C1,2,100,20,A,Andina\n\
         2,2024-02-10,P2,C2,1,300,90,B,Caribe\n\
         3,2024-02-20,P9,C1,1,100,,A,Andina\n",
    );
    write(
        dir,
        "productos_andina.csv",
        "producto_id,descripcion,categoria,subcategoria\n\
         P1,Cable 12AWG,Eléctrico,Cables\n\
         P2,Tubo PVC,Plomería,Tubos\n",
    );
    write(
        dir,
        "clientes_andina.json",
        r#"[
            {"cliente_id": "C1", "nombre_cliente": "Ferretería Sol", "segmento": "X", "ciudad": "Bogotá", "estado": "Activo"},
            {"cliente_id": "C2", "nombre_cliente": "Constructora Río", "segmento": "Y", "ciudad": "Cali", "estado": "Inactivo"}
        ]"#,
    );
    write(
        dir,
        "importaciones_andina.csv",
        "importacion_id;proveedor;fecha_orden;fecha_llegada;costo_mercancia_usd\n\
         I1;Shenzhen Co;2024-01-01;2024-01-31;1000,50\n\
         I2;Texas Inc;2024-02-01;2024-02-11;2000\n",
    );
}

#[test]
fn test_enriched_sales_from_exports() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let data = process(DirectorySource::new(tmp.path()).load().unwrap());
    let fact = data.table(TableKey::VentasEnriched).unwrap();

    // Left join keeps every sale.
    assert_eq!(fact.row_count(), 3);

    // Sales-side attributes win; the product's value moves to a suffixed column.
    assert_eq!(fact.value(0, "categoria"), Some(&Value::from("A")));
    assert_eq!(fact.value(0, "categoria_master"), Some(&Value::from("Eléctrico")));
    assert_eq!(fact.value(0, "segmento"), Some(&Value::from("X")));
    assert_eq!(fact.value(0, "margen_pct"), Some(&Value::Number(0.2)));

    // Unknown product leaves nulls; a missing margin gives a zero ratio.
    assert_eq!(fact.value(2, "descripcion"), Some(&Value::Null));
    assert_eq!(fact.value(2, "margen_pct"), Some(&Value::Number(0.0)));

    let joins = data.report.enrichment.as_ref().unwrap();
    assert_eq!(joins.joins[&TableKey::Productos].unmatched_rows, 1);
    assert!(!joins.has_duplicates());
}

#[test]
fn test_numeric_ids_take_category_from_products() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "ventas_andina.json",
        r#"[{"cliente_id": 1, "producto_id": 10, "subtotal_cop": 1000, "margen_total_cop": 200, "fecha": "2024-01-15"}]"#,
    );
    write(
        tmp.path(),
        "productos_andina.json",
        r#"[{"producto_id": 10, "categoria": "A"}]"#,
    );
    write(
        tmp.path(),
        "clientes_andina.json",
        r#"[{"cliente_id": 1, "segmento": "X"}]"#,
    );

    let data = process(DirectorySource::new(tmp.path()).load().unwrap());
    let fact = data.table(TableKey::VentasEnriched).unwrap();

    assert_eq!(fact.row_count(), 1);
    assert_eq!(fact.value(0, "categoria"), Some(&Value::from("A")));
    assert_eq!(fact.value(0, "segmento"), Some(&Value::from("X")));
    assert_eq!(fact.value(0, "margen_pct"), Some(&Value::Number(0.2)));
    assert!(!data.fields.has(TableKey::VentasEnriched, "categoria_master"));
}

#[test]
fn test_views_from_exports() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let data = process(DirectorySource::new(tmp.path()).load().unwrap());

    let built = build_views(ViewName::All, &data, &ViewOptions::default());
    assert_eq!(built.len(), 6);

    match &built[0].1 {
        Ok(ViewReport::Overview(overview)) => {
            assert_eq!(overview.total_sales, 500.0);
            assert_eq!(overview.active_customers, 1);
            assert_eq!(
                overview.sales_trend.text,
                "Tendencia: +300.0% vs periodo anterior ($400 vs $100)."
            );
        }
        other => panic!("unexpected overview: {:?}", other),
    }

    match &built[3].1 {
        Ok(ViewReport::Imports(imports)) => {
            assert_eq!(imports.total_usd, 3000.5);
            assert_eq!(imports.lead_time.as_ref().unwrap().max, 30.0);
        }
        other => panic!("unexpected imports: {:?}", other),
    }

    assert_eq!(
        built[4].1.as_ref().unwrap_err(),
        &ViewUnavailable::Table {
            table: TableKey::Inventario
        }
    );
}

#[test]
fn test_reports_serialize_to_json() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let data = process(DirectorySource::new(tmp.path()).load().unwrap());

    let built = build_views(ViewName::Customers, &data, &ViewOptions::default());
    let report = built[0].1.as_ref().unwrap();
    let json = serde_json::to_value(report).unwrap();

    assert_eq!(json["view"], "customers");
    assert!(json["leaderboard"].is_array());
    assert_eq!(json["leaderboard"][0]["nombre_cliente"], "Constructora Río");
}

#[test]
fn test_missing_exports_leave_views_unavailable() {
    let tmp = TempDir::new().unwrap();
    let data = process(DirectorySource::new(tmp.path()).load().unwrap());

    assert!(data.table(TableKey::VentasEnriched).is_none());
    for (_, outcome) in build_views(ViewName::All, &data, &ViewOptions::default()) {
        assert!(outcome.is_err());
    }
}
