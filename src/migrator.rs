use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_warehouse_items_table::Migration),
            Box::new(m20240301_000002_create_products_table::Migration),
            Box::new(m20240301_000003_create_product_recipes_table::Migration),
            Box::new(m20240301_000004_create_orders_table::Migration),
            Box::new(m20240301_000005_create_order_items_table::Migration),
            Box::new(m20240301_000006_create_order_reservations_table::Migration),
            Box::new(m20240301_000007_create_warehouse_operations_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_warehouse_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_warehouse_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WarehouseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WarehouseItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(WarehouseItems::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseItems::MinQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseItems::CostPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseItems::RetailPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseItems::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(WarehouseItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseItems::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum WarehouseItems {
        Table,
        Id,
        Name,
        Quantity,
        MinQuantity,
        CostPrice,
        RetailPrice,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::IsEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Name,
        IsEnabled,
        Price,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_product_recipes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_product_recipes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductRecipes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductRecipes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::WarehouseItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::QuantityPerUnit)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::IsOptional)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ProductRecipes::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_recipes_product_id")
                        .table(ProductRecipes::Table)
                        .col(ProductRecipes::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_recipes_warehouse_item_id")
                        .table(ProductRecipes::Table)
                        .col(ProductRecipes::WarehouseItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductRecipes::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum ProductRecipes {
        Table,
        Id,
        ProductId,
        WarehouseItemId,
        QuantityPerUnit,
        IsOptional,
        IsDeleted,
        CreatedAt,
    }
}

mod m20240301_000004_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_order_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderItems::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        UnitPrice,
        CreatedAt,
    }
}

mod m20240301_000006_create_order_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_order_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderReservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderReservations::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderReservations::WarehouseItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderReservations::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderReservations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_reservations_order_id")
                        .table(OrderReservations::Table)
                        .col(OrderReservations::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_reservations_warehouse_item_id")
                        .table(OrderReservations::Table)
                        .col(OrderReservations::WarehouseItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderReservations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderReservations {
        Table,
        Id,
        OrderId,
        WarehouseItemId,
        Quantity,
        CreatedAt,
    }
}

mod m20240301_000007_create_warehouse_operations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_warehouse_operations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WarehouseOperations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseOperations::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::WarehouseItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::OperationType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::QuantityChange)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::BalanceAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseOperations::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(WarehouseOperations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_operations_warehouse_item_id")
                        .table(WarehouseOperations::Table)
                        .col(WarehouseOperations::WarehouseItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseOperations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum WarehouseOperations {
        Table,
        Id,
        WarehouseItemId,
        OperationType,
        QuantityChange,
        BalanceAfter,
        Description,
        OrderId,
        CreatedAt,
    }
}
