//! Northwind reference data set.
//!
//! 91 customers, 9 employees and a deterministic order history, embedded as
//! JSON and exposed both as entities (for building expectations) and as row
//! sets (for the scripted executor).

use chrono::{DateTime, Utc};
use rawsql_core::{
    Entity, ExecutionError, Navigation, RawSqlResult, Row, RowReader, RowSet, Value,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const CUSTOMERS_JSON: &str = include_str!("../data/customers.json");
const EMPLOYEES_JSON: &str = include_str!("../data/employees.json");
const ORDERS_JSON: &str = include_str!("../data/orders.json");

/// Statement templates understood by [`crate::northwind_executor`].
pub mod sql {
    pub const CUSTOMERS: &str = r#"SELECT * FROM "Customers""#;
    pub const CUSTOMERS_CONTACT_Z: &str =
        r#"SELECT * FROM "Customers" WHERE "ContactName" LIKE '%z%'"#;
    pub const CUSTOMERS_COLUMNS_OUT_OF_ORDER: &str = r#"SELECT "Region", "PostalCode", "Country", "ContactTitle", "ContactName", "CompanyName", "CustomerID", "City" FROM "Customers""#;
    pub const CUSTOMERS_IN_LONDON: &str = r#"SELECT * FROM "Customers" WHERE "City" = 'London'"#;
    pub const CUSTOMERS_IN_SEATTLE: &str = r#"SELECT * FROM "Customers" WHERE "City" = 'Seattle'"#;
    pub const CUSTOMERS_BY_CITY: &str = r#"SELECT * FROM "Customers" WHERE "City" = {0}"#;
    pub const CUSTOMERS_BY_CITY_AND_TITLE: &str =
        r#"SELECT * FROM "Customers" WHERE "City" = {0} AND "ContactTitle" = {1}"#;
    pub const EMPLOYEES: &str = r#"SELECT * FROM "Employees""#;
    pub const EMPLOYEES_BY_MANAGER: &str = r#"SELECT * FROM "Employees" WHERE "ReportsTo" = {0} OR ("ReportsTo" IS NULL AND {0} IS NULL)"#;
    pub const ORDERS: &str = r#"SELECT * FROM "Orders""#;
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Customer {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    #[serde(skip)]
    pub orders: Vec<Order>,
}

impl Customer {
    pub const COLUMNS: [&'static str; 8] = [
        "CustomerID",
        "CompanyName",
        "ContactName",
        "ContactTitle",
        "City",
        "Region",
        "PostalCode",
        "Country",
    ];

    /// The `Orders` collection navigation.
    pub fn orders() -> Navigation<Customer, Order> {
        Navigation::new(
            "Orders",
            sql::ORDERS,
            |order| Value::from(order.customer_id.clone()),
            |customer, orders| customer.orders = orders,
        )
    }
}

impl Entity for Customer {
    const ENTITY_NAME: &'static str = "Customer";
    const TABLE: &'static str = "Customers";

    fn primary_key(&self) -> Value {
        Value::from(self.customer_id.clone())
    }

    fn from_row(row: &Row) -> RawSqlResult<Self> {
        let r = RowReader::new(row, Self::ENTITY_NAME);
        Ok(Self {
            customer_id: r.text("CustomerID")?,
            company_name: r.text("CompanyName")?,
            contact_name: r.opt_text("ContactName")?,
            contact_title: r.opt_text("ContactTitle")?,
            city: r.opt_text("City")?,
            region: r.opt_text("Region")?,
            postal_code: r.opt_text("PostalCode")?,
            country: r.opt_text("Country")?,
            orders: Vec::new(),
        })
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "CustomerID" => Value::from(self.customer_id.clone()),
            "CompanyName" => Value::from(self.company_name.clone()),
            "ContactName" => Value::from(self.contact_name.clone()),
            "ContactTitle" => Value::from(self.contact_title.clone()),
            "City" => Value::from(self.city.clone()),
            "Region" => Value::from(self.region.clone()),
            "PostalCode" => Value::from(self.postal_code.clone()),
            "Country" => Value::from(self.country.clone()),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    #[serde(rename = "OrderID")]
    pub order_id: i64,
    #[serde(rename = "CustomerID")]
    pub customer_id: Option<String>,
    #[serde(rename = "EmployeeID")]
    pub employee_id: Option<i64>,
    pub order_date: Option<DateTime<Utc>>,
    pub ship_city: Option<String>,
}

impl Order {
    pub const COLUMNS: [&'static str; 5] =
        ["OrderID", "CustomerID", "EmployeeID", "OrderDate", "ShipCity"];
}

impl Entity for Order {
    const ENTITY_NAME: &'static str = "Order";
    const TABLE: &'static str = "Orders";

    fn primary_key(&self) -> Value {
        Value::Int(self.order_id)
    }

    fn from_row(row: &Row) -> RawSqlResult<Self> {
        let r = RowReader::new(row, Self::ENTITY_NAME);
        Ok(Self {
            order_id: r.int("OrderID")?,
            customer_id: r.opt_text("CustomerID")?,
            employee_id: r.opt_int("EmployeeID")?,
            order_date: r.opt_timestamp("OrderDate")?,
            ship_city: r.opt_text("ShipCity")?,
        })
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "OrderID" => Value::Int(self.order_id),
            "CustomerID" => Value::from(self.customer_id.clone()),
            "EmployeeID" => Value::from(self.employee_id),
            "OrderDate" => Value::from(self.order_date),
            "ShipCity" => Value::from(self.ship_city.clone()),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employee {
    #[serde(rename = "EmployeeID")]
    pub employee_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub title: Option<String>,
    pub city: Option<String>,
    pub reports_to: Option<i64>,
}

impl Employee {
    pub const COLUMNS: [&'static str; 6] =
        ["EmployeeID", "LastName", "FirstName", "Title", "City", "ReportsTo"];
}

impl Entity for Employee {
    const ENTITY_NAME: &'static str = "Employee";
    const TABLE: &'static str = "Employees";

    fn primary_key(&self) -> Value {
        Value::Int(self.employee_id)
    }

    fn from_row(row: &Row) -> RawSqlResult<Self> {
        let r = RowReader::new(row, Self::ENTITY_NAME);
        Ok(Self {
            employee_id: r.int("EmployeeID")?,
            last_name: r.text("LastName")?,
            first_name: r.text("FirstName")?,
            title: r.opt_text("Title")?,
            city: r.opt_text("City")?,
            reports_to: r.opt_int("ReportsTo")?,
        })
    }

    fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "EmployeeID" => Value::Int(self.employee_id),
            "LastName" => Value::from(self.last_name.clone()),
            "FirstName" => Value::from(self.first_name.clone()),
            "Title" => Value::from(self.title.clone()),
            "City" => Value::from(self.city.clone()),
            "ReportsTo" => Value::from(self.reports_to),
            _ => return None,
        };
        Some(value)
    }
}

// ============================================================================
// DATA ACCESS
// ============================================================================

fn load<T: DeserializeOwned>(json: &str, name: &str) -> RawSqlResult<Vec<T>> {
    serde_json::from_str(json).map_err(|e| {
        ExecutionError::ExecutorFailed {
            reason: format!("failed to load {} reference data: {}", name, e),
        }
        .into()
    })
}

pub fn customers() -> RawSqlResult<Vec<Customer>> {
    load(CUSTOMERS_JSON, "customers")
}

pub fn employees() -> RawSqlResult<Vec<Employee>> {
    load(EMPLOYEES_JSON, "employees")
}

pub fn orders() -> RawSqlResult<Vec<Order>> {
    load(ORDERS_JSON, "orders")
}

/// Customers with their `orders` collection populated.
pub fn customers_with_orders() -> RawSqlResult<Vec<Customer>> {
    let orders = orders()?;
    let mut customers = customers()?;
    for customer in &mut customers {
        customer.orders = orders
            .iter()
            .filter(|o| o.customer_id.as_deref() == Some(customer.customer_id.as_str()))
            .cloned()
            .collect();
    }
    Ok(customers)
}

fn customer_values(c: &Customer) -> Vec<Value> {
    vec![
        Value::from(c.customer_id.clone()),
        Value::from(c.company_name.clone()),
        Value::from(c.contact_name.clone()),
        Value::from(c.contact_title.clone()),
        Value::from(c.city.clone()),
        Value::from(c.region.clone()),
        Value::from(c.postal_code.clone()),
        Value::from(c.country.clone()),
    ]
}

/// Customer rows matching `filter`, in reference order.
pub fn customer_rows(filter: impl Fn(&Customer) -> bool) -> RawSqlResult<RowSet> {
    let mut rows = RowSet::new(Customer::COLUMNS);
    for customer in customers()?.iter().filter(|c| filter(c)) {
        rows.push(customer_values(customer))?;
    }
    Ok(rows)
}

/// Every customer row with the column header permuted.
pub fn customer_rows_out_of_order() -> RawSqlResult<RowSet> {
    const ORDER: [usize; 8] = [5, 6, 7, 3, 2, 1, 0, 4];
    let mut rows = RowSet::new(ORDER.iter().map(|&i| Customer::COLUMNS[i]));
    for customer in customers()? {
        let values = customer_values(&customer);
        rows.push(ORDER.iter().map(|&i| values[i].clone()).collect())?;
    }
    Ok(rows)
}

pub fn employee_rows(filter: impl Fn(&Employee) -> bool) -> RawSqlResult<RowSet> {
    let mut rows = RowSet::new(Employee::COLUMNS);
    for e in employees()?.iter().filter(|e| filter(e)) {
        rows.push(vec![
            Value::Int(e.employee_id),
            Value::from(e.last_name.clone()),
            Value::from(e.first_name.clone()),
            Value::from(e.title.clone()),
            Value::from(e.city.clone()),
            Value::from(e.reports_to),
        ])?;
    }
    Ok(rows)
}

pub fn order_rows() -> RawSqlResult<RowSet> {
    let mut rows = RowSet::new(Order::COLUMNS);
    for o in orders()? {
        rows.push(vec![
            Value::Int(o.order_id),
            Value::from(o.customer_id),
            Value::from(o.employee_id),
            Value::from(o.order_date),
            Value::from(o.ship_city),
        ])?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_data_sizes() {
        assert_eq!(customers().unwrap().len(), 91);
        assert_eq!(employees().unwrap().len(), 9);
        assert_eq!(orders().unwrap().len(), 608);
    }

    #[test]
    fn test_rows_round_trip_through_entities() {
        let rows = customer_rows(|_| true).unwrap();
        let from_rows: Vec<Customer> = rows
            .rows()
            .iter()
            .map(Customer::from_row)
            .collect::<RawSqlResult<_>>()
            .unwrap();
        assert_eq!(from_rows, customers().unwrap());

        let shuffled = customer_rows_out_of_order().unwrap();
        assert_eq!(shuffled.columns()[0], "Region");
        let first = Customer::from_row(&shuffled.rows()[0]).unwrap();
        assert_eq!(first.customer_id, "ALFKI");
        assert_eq!(first.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_orders_group_onto_customers() {
        let customers = customers_with_orders().unwrap();
        let total: usize = customers.iter().map(|c| c.orders.len()).sum();
        assert_eq!(total, 608);

        let alfki = customers.iter().find(|c| c.customer_id == "ALFKI").unwrap();
        assert_eq!(alfki.orders.len(), 5);
        let fissa = customers.iter().find(|c| c.customer_id == "FISSA").unwrap();
        assert!(fissa.orders.is_empty());
    }
}
