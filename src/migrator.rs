use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250101_000001_create_pedidos_table::Migration)]
    }
}

mod m20250101_000001_create_pedidos_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_pedidos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order Model; the storefront may have created it already
            manager
                .create_table(
                    Table::create()
                        .table(Pedidos::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Pedidos::TransactionId)
                                .string_len(128)
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Pedidos::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Pedidos::Valor)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Pedidos::Nome).string().null())
                        .col(ColumnDef::new(Pedidos::Email).string().null())
                        .col(ColumnDef::new(Pedidos::Cpf).string_len(20).null())
                        .col(ColumnDef::new(Pedidos::Telefone).string_len(20).null())
                        .col(ColumnDef::new(Pedidos::UtmParams).text().null())
                        .col(
                            ColumnDef::new(Pedidos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Pedidos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedidos_status")
                        .table(Pedidos::Table)
                        .col(Pedidos::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Pedidos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Pedidos {
        Table,
        TransactionId,
        Status,
        Valor,
        Nome,
        Email,
        Cpf,
        Telefone,
        UtmParams,
        CreatedAt,
        UpdatedAt,
    }
}
