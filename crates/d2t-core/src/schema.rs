//! Schema text sent to the model as grounding context.
//!
//! The bundled text describes the sample retail database (vendors, products,
//! customers, orders, order items). Deployments pointing at another
//! database supply their own text through configuration.

pub const DEFAULT_SCHEMA: &str = "\
Table Vendors (
  vend_id      CHAR(10)  PRIMARY KEY,
  vend_name    CHAR(50)  NOT NULL,
  vend_address CHAR(50),
  vend_city    CHAR(50),
  vend_state   CHAR(5),
  vend_zip     CHAR(10),
  vend_country CHAR(50)
)

Table Products (
  prod_id    CHAR(10)     PRIMARY KEY,
  vend_id    CHAR(10)     NOT NULL REFERENCES Vendors(vend_id),
  prod_name  CHAR(255)    NOT NULL,
  prod_price DECIMAL(8,2) NOT NULL,
  prod_desc  TEXT
)

Table Customers (
  cust_id      CHAR(10)  PRIMARY KEY,
  cust_name    CHAR(50)  NOT NULL,
  cust_address CHAR(50),
  cust_city    CHAR(50),
  cust_state   CHAR(5),
  cust_zip     CHAR(10),
  cust_country CHAR(50),
  cust_contact CHAR(50),
  cust_email   CHAR(255)
)

Table Orders (
  order_num  INTEGER   PRIMARY KEY,
  order_date DATE      NOT NULL,
  cust_id    CHAR(10)  NOT NULL REFERENCES Customers(cust_id)
)

Table OrderItems (
  order_num  INTEGER      NOT NULL REFERENCES Orders(order_num),
  order_item INTEGER      NOT NULL,
  prod_id    CHAR(10)     NOT NULL REFERENCES Products(prod_id),
  quantity   INTEGER      NOT NULL,
  item_price DECIMAL(8,2) NOT NULL,
  PRIMARY KEY (order_num, order_item)
)
";
